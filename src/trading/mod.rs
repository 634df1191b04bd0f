//! Trading logic: position sizing, take-profit targets, exposure and exits.

mod config;
mod decision;
pub mod odds;
mod portfolio;
mod position_sizer;
mod strategy;
mod targets;

pub use config::{PortfolioConfig, SizingConfig, TargetConfig};
pub use decision::NoTrade;
pub use odds::{position_pnl, PositionPnl};
pub use portfolio::{Opportunity, PortfolioKelly, PortfolioPosition};
pub use position_sizer::{fraction_of, KellySizer, SizingInput, SizingResult};
pub use strategy::{ExitConfig, ExitMonitor, ExitReason, ExitSignal, MonitoredPosition};
pub use targets::{TargetCalculator, TargetLevels, TargetResult};
