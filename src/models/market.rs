//! Market model for a binary Polymarket prediction market.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Binary prediction market snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Market condition ID (0x-prefixed)
    pub condition_id: String,

    /// Market question
    pub question: String,

    /// URL-friendly slug, used as the market key everywhere
    pub slug: String,

    /// Current YES price (0.0 to 1.0)
    pub yes_price: f64,

    /// Current NO price (0.0 to 1.0)
    pub no_price: f64,

    /// Lifetime trading volume in USDC
    #[serde(default)]
    pub volume: Decimal,

    /// Order book liquidity in USDC
    #[serde(default)]
    pub liquidity: Decimal,

    /// When the market ends
    pub end_date: Option<DateTime<Utc>>,

    /// Category (e.g., "politics", "sports", "crypto")
    #[serde(default)]
    pub category: String,

    /// Short description
    #[serde(default)]
    pub description: String,
}

impl Market {
    /// Create a new market with minimal info.
    pub fn new(slug: impl Into<String>, question: impl Into<String>, yes_price: f64) -> Self {
        Self {
            condition_id: String::new(),
            question: question.into(),
            slug: slug.into(),
            yes_price,
            no_price: 1.0 - yes_price,
            volume: Decimal::ZERO,
            liquidity: Decimal::ZERO,
            end_date: None,
            category: String::new(),
            description: String::new(),
        }
    }

    /// Deviation of YES + NO from $1.00.
    pub fn spread(&self) -> f64 {
        (1.0 - (self.yes_price + self.no_price)).abs()
    }

    /// Fractional days until the market ends, floored at zero.
    pub fn days_to_resolution(&self, now: DateTime<Utc>) -> Option<f64> {
        let end = self.end_date?;
        let secs = (end - now).num_seconds().max(0) as f64;
        Some(secs / 86_400.0)
    }
}
