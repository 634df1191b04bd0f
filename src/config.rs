//! Environment configuration layered over built-in defaults.
//!
//! Variables (all optional):
//! - POLYEDGE_DATABASE_URL
//! - POLYEDGE_GAMMA_URL
//! - POLYEDGE_BANKROLL
//! - POLYEDGE_MIN_EDGE
//! - POLYEDGE_CAP_FRACTION
//! - POLYEDGE_MAX_DRAWDOWN
//! - POLYEDGE_CAPTURE_RATIO
//! - POLYEDGE_RISK_RATIO

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::api::GAMMA_API_BASE;
use crate::trading::{SizingConfig, TargetConfig};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./polyedge.db?mode=rwc";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be in {range}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: f64,
        range: &'static str,
    },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub gamma_url: String,

    /// Starting paper bankroll
    pub bankroll: Decimal,

    pub sizing: SizingConfig,
    pub targets: TargetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gamma_url: GAMMA_API_BASE.to_string(),
            bankroll: dec!(10000), // $10k paper bankroll
            sizing: SizingConfig::default(),
            targets: TargetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("POLYEDGE_DATABASE_URL").filter(|v| !v.is_empty()) {
            config.database_url = url;
        }
        if let Some(url) = lookup("POLYEDGE_GAMMA_URL").filter(|v| !v.is_empty()) {
            config.gamma_url = url;
        }
        if let Some(bankroll) = parse::<Decimal>(&lookup, "POLYEDGE_BANKROLL")? {
            if bankroll <= Decimal::ZERO {
                return Err(ConfigError::Invalid {
                    var: "POLYEDGE_BANKROLL",
                    value: bankroll.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            config.bankroll = bankroll;
        }

        if let Some(v) = fraction(&lookup, "POLYEDGE_MIN_EDGE", "[0, 1)", |x| (0.0..1.0).contains(&x))? {
            config.sizing.min_edge = v;
        }
        if let Some(v) = fraction(&lookup, "POLYEDGE_CAP_FRACTION", "(0, 1]", |x| x > 0.0 && x <= 1.0)? {
            config.sizing.cap_fraction = v;
        }
        if let Some(v) = fraction(&lookup, "POLYEDGE_MAX_DRAWDOWN", "(0, 1]", |x| x > 0.0 && x <= 1.0)? {
            config.sizing.max_drawdown = v;
        }
        if let Some(v) = fraction(&lookup, "POLYEDGE_CAPTURE_RATIO", "(0, 1)", open_unit)? {
            config.targets.capture_ratio = v;
        }
        if let Some(v) = fraction(&lookup, "POLYEDGE_RISK_RATIO", "(0, 1)", open_unit)? {
            config.targets.risk_ratio = v;
        }

        Ok(config)
    }
}

fn open_unit(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn fraction(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    range: &'static str,
    valid: impl Fn(f64) -> bool,
) -> Result<Option<f64>, ConfigError> {
    match parse::<f64>(lookup, var)? {
        Some(value) if !valid(value) => Err(ConfigError::OutOfRange { var, value, range }),
        other => Ok(other),
    }
}
