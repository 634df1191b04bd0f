//! Outcome side of a binary market and conversions between price spaces.
//!
//! Prices are quoted in YES space by the exchange. A NO token trades at
//! `1 - yes_price`, so every NO-side quantity can be mirrored through
//! `1 - x` to move between the two spaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which outcome token a position holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }

    /// Side favoured by an estimate: YES when the estimate beats the price.
    pub fn favoured(yes_price: f64, est_prob: f64) -> Self {
        if est_prob > yes_price {
            Side::Yes
        } else {
            Side::No
        }
    }

    /// Price of this side's token given the YES price.
    pub fn token_price(&self, yes_price: f64) -> f64 {
        match self {
            Side::Yes => yes_price,
            Side::No => 1.0 - yes_price,
        }
    }

    /// Probability that this side pays out given P(YES).
    pub fn token_probability(&self, yes_prob: f64) -> f64 {
        self.token_price(yes_prob)
    }

    /// Convert a traded-token price into YES space.
    pub fn to_yes_space(&self, traded_price: f64) -> f64 {
        self.token_price(traded_price)
    }

    /// Convert a YES-space price into this side's token space.
    pub fn from_yes_space(&self, yes_price: f64) -> f64 {
        self.token_price(yes_price)
    }

    /// Payout per share at resolution (`outcome` is 1 when YES won).
    pub fn payout(&self, outcome: u8) -> f64 {
        match (self, outcome) {
            (Side::Yes, 1) | (Side::No, 0) => 1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "YES" | "Y" => Ok(Side::Yes),
            "NO" | "N" => Ok(Side::No),
            other => anyhow::bail!("Side must be YES or NO, got '{}'", other),
        }
    }
}
