//! Reasons the engine declines to act.
//!
//! These are returned inside results, never raised: callers branch on them
//! to decide whether to trade this cycle.

use thiserror::Error;

/// Why a sizing or target computation produced no actionable output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoTrade {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no edge: {edge:.4} does not clear threshold {threshold:.4}")]
    NoEdge { edge: f64, threshold: f64 },

    #[error("drawdown {drawdown:.2} at or above limit {limit:.2}")]
    DrawdownHalt { drawdown: f64, limit: f64 },

    #[error("entry price {price:.4} leaves too little room to move")]
    PriceOutOfRange { price: f64 },

    #[error("target {target:.4} outside tradeable price bounds")]
    Unreachable { target: f64 },
}

impl NoTrade {
    /// Short machine-readable tag for structured log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            NoTrade::InvalidInput(_) => "invalid_input",
            NoTrade::NoEdge { .. } => "no_edge",
            NoTrade::DrawdownHalt { .. } => "drawdown_halt",
            NoTrade::PriceOutOfRange { .. } => "price_out_of_range",
            NoTrade::Unreachable { .. } => "unreachable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let reason = NoTrade::NoEdge { edge: 0.01, threshold: 0.05 };
        assert_eq!(reason.to_string(), "no edge: 0.0100 does not clear threshold 0.0500");
        assert_eq!(reason.tag(), "no_edge");

        let reason = NoTrade::InvalidInput("price 1.2 not in (0,1)".into());
        assert!(reason.to_string().starts_with("invalid input"));
    }
}
