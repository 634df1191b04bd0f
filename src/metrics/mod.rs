//! Performance metrics: win rate, drawdown, Sharpe and Sortino ratios.

mod calculator;

pub use calculator::{max_drawdown, sharpe_sortino, Drawdown, PerformanceMetrics};
