//! Bounded per-market price history shared by the predictors.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of observations kept per market.
pub const DEFAULT_CAPACITY: usize = 100;

/// A single YES-price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Recent YES prices per market, oldest first.
///
/// Owned by whoever drives the predictors (backtester, paper trader, CLI)
/// and passed to them by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    capacity: usize,
    series: HashMap<String, VecDeque<PricePoint>>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    /// Append an observation, evicting the oldest beyond capacity.
    pub fn update(&mut self, market_slug: &str, price: f64, timestamp: DateTime<Utc>) {
        let series = self.series.entry(market_slug.to_string()).or_default();
        series.push_back(PricePoint { timestamp, price });
        while series.len() > self.capacity {
            series.pop_front();
        }
    }

    /// Last `n` prices for a market, oldest first.
    pub fn prices(&self, market_slug: &str, n: usize) -> Vec<f64> {
        self.series
            .get(market_slug)
            .map(|s| {
                let skip = s.len().saturating_sub(n);
                s.iter().skip(skip).map(|p| p.price).collect()
            })
            .unwrap_or_default()
    }

    /// Every retained price for a market, oldest first.
    pub fn all_prices(&self, market_slug: &str) -> Vec<f64> {
        self.prices(market_slug, self.capacity)
    }

    pub fn latest(&self, market_slug: &str) -> Option<f64> {
        self.series
            .get(market_slug)
            .and_then(|s| s.back())
            .map(|p| p.price)
    }

    pub fn market_count(&self) -> usize {
        self.series.len()
    }

    /// Load a history snapshot from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read price history from {}", path.display()))?;
        serde_json::from_str(&raw).context("Failed to parse price history")
    }

    /// Write a history snapshot as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write price history to {}", path.display()))
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_ring() {
        let mut history = PriceHistory::new(3);
        let now = Utc::now();
        for p in [0.1, 0.2, 0.3, 0.4] {
            history.update("m", p, now);
        }

        assert_eq!(history.all_prices("m"), vec![0.2, 0.3, 0.4]);
        assert_eq!(history.prices("m", 2), vec![0.3, 0.4]);
        assert_eq!(history.latest("m"), Some(0.4));
    }

    #[test]
    fn test_unknown_market_is_empty() {
        let history = PriceHistory::default();
        assert!(history.prices("missing", 5).is_empty());
        assert!(history.all_prices("missing").is_empty());
        assert_eq!(history.latest("missing"), None);
    }

    #[test]
    fn test_save_and_load() {
        let mut history = PriceHistory::default();
        history.update("m", 0.42, Utc::now());

        let path = std::env::temp_dir().join(format!("polyedge-history-{}.json", uuid::Uuid::new_v4()));
        history.save(&path).unwrap();
        let loaded = PriceHistory::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.all_prices("m"), vec![0.42]);
    }
}
