//! Probability estimation: price history, base predictors, the ensemble
//! and calibration tracking.

mod ensemble;
mod history;
mod predictor;
mod tracker;

pub use ensemble::{EdgeEstimator, StrategyKind};
pub use history::PriceHistory;
pub use predictor::PredictionContext;
pub use tracker::{PredictionRecord, PredictionTracker};
