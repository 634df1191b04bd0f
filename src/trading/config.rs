//! Sizing, target and portfolio configuration.

use serde::{Deserialize, Serialize};

/// Configuration for Kelly position sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Edge (traded-side probability minus price) at or below which we do not trade
    pub min_edge: f64,

    /// Multiplier on raw Kelly before haircuts (1.0 = full Kelly)
    pub kelly_multiplier: f64,

    /// Upper bound on the final bankroll fraction
    pub cap_fraction: f64,

    /// Floor for the correlation haircut factor
    pub min_correlation_factor: f64,

    /// Drawdown at which trading halts entirely (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Drawdown where the half-size step begins
    pub drawdown_half_step: f64,

    /// Drawdown above which size drops to a quarter
    pub drawdown_quarter_step: f64,

    /// Edges below this earn a "consider passing" recommendation
    pub small_edge_warning: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            min_edge: 0.0,                 // Any positive edge
            kelly_multiplier: 1.0,         // Full Kelly, haircuts do the rest
            cap_fraction: 0.5,             // Never more than half the bankroll
            min_correlation_factor: 0.1,   // Correlation keeps at least 10%
            max_drawdown: 0.20,            // Stop at 20% drawdown
            drawdown_half_step: 0.05,      // Half size from 5% drawdown
            drawdown_quarter_step: 0.15,   // Quarter size above 15%
            small_edge_warning: 0.05,
        }
    }
}

/// Configuration for take-profit and stop-loss targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Share of the initial edge to lock in at the take-profit
    pub capture_ratio: f64,

    /// Share of position value risked before the stop-loss fires
    pub risk_ratio: f64,

    /// Minimum |edge| to set targets at all
    pub min_edge_threshold: f64,

    /// Entries below this hold to resolution
    pub min_entry_price: f64,

    /// Entries above this hold to resolution
    pub max_entry_price: f64,

    /// Lowest reachable target price
    pub min_target_price: f64,

    /// Highest reachable target price
    pub max_target_price: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            capture_ratio: 0.75,       // Capture 75% of the edge
            risk_ratio: 0.5,           // Cut at 50% of position value
            min_edge_threshold: 0.05,  // 5% edge
            min_entry_price: 0.10,
            max_entry_price: 0.90,
            min_target_price: 0.01,
            max_target_price: 0.99,
        }
    }
}

/// Configuration for portfolio-level exposure limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Maximum bankroll fraction in one category
    pub max_category_exposure: f64,

    /// Maximum bankroll fraction across all positions
    pub max_total_exposure: f64,

    /// Allocations smaller than this are skipped
    pub min_allocation: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            max_category_exposure: 0.30,  // 30% per category
            max_total_exposure: 0.50,     // 50% deployed at most
            min_allocation: 0.01,         // 1% minimum position
        }
    }
}
