//! Execution cost model for simulated fills.
//!
//! Slippage has two parts: half the bid-ask spread, and a market impact
//! term that grows with position size relative to book liquidity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Side;

/// Slippage model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlippageConfig {
    /// Assumed bid-ask spread; half of it is paid on entry
    pub spread: f64,

    /// Upper bound on total slippage
    pub max_slippage: f64,

    /// Highest fill price a buy can reach
    pub max_fill_price: f64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            spread: 0.02,        // 2 cents
            max_slippage: 0.10,  // 10%
            max_fill_price: 0.99,
        }
    }
}

/// Breakdown of an estimate, as fractions of price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippageEstimate {
    pub base_slippage: f64,
    pub market_impact: f64,
    pub spread_cost: f64,
    pub total_slippage: f64,
    pub size_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SlippageModel {
    config: SlippageConfig,
}

impl SlippageModel {
    pub fn new(config: SlippageConfig) -> Self {
        Self { config }
    }

    /// Base slippage for a liquidity tier.
    pub fn base_slippage(liquidity: f64) -> f64 {
        match liquidity {
            l if l < 10_000.0 => 0.05,
            l if l < 50_000.0 => 0.03,
            l if l < 100_000.0 => 0.02,
            l if l < 500_000.0 => 0.01,
            _ => 0.005,
        }
    }

    /// Estimate slippage for buying `position_size` dollars into `liquidity`.
    pub fn estimate(&self, position_size: Decimal, liquidity: Decimal) -> SlippageEstimate {
        let size = position_size.to_f64().unwrap_or(0.0).max(0.0);
        let liquidity = liquidity.to_f64().unwrap_or(0.0);

        let base_slippage = Self::base_slippage(liquidity);
        let (market_impact, size_ratio) = if liquidity > 0.0 {
            let ratio = size / liquidity;
            (base_slippage * ratio.powf(0.6), ratio)
        } else {
            (base_slippage, 0.0)
        };
        let spread_cost = self.config.spread / 2.0;

        SlippageEstimate {
            base_slippage,
            market_impact,
            spread_cost,
            total_slippage: (spread_cost + market_impact).min(self.config.max_slippage),
            size_ratio,
        }
    }

    /// Simulated fill price for buying `side` when YES trades at `yes_price`.
    ///
    /// Returned in traded-token space; slippage always makes the buy dearer.
    pub fn fill_price(
        &self,
        side: Side,
        yes_price: f64,
        position_size: Decimal,
        liquidity: Decimal,
    ) -> f64 {
        let quoted = side.token_price(yes_price);
        let slip = self.estimate(position_size, liquidity).total_slippage;
        (quoted * (1.0 + slip)).min(self.config.max_fill_price)
    }

    /// Largest position (to the dollar) whose slippage stays within `max_slippage`.
    ///
    /// Searches up to 20% of liquidity.
    pub fn recommend_position_size(&self, liquidity: Decimal, max_slippage: f64) -> Decimal {
        let mut low = 0.0_f64;
        let mut high = liquidity.to_f64().unwrap_or(0.0) * 0.2;

        while high - low > 1.0 {
            let mid = (low + high) / 2.0;
            let mid_dec = Decimal::try_from(mid).unwrap_or(Decimal::ZERO);
            if self.estimate(mid_dec, liquidity).total_slippage <= max_slippage {
                low = mid;
            } else {
                high = mid;
            }
        }

        Decimal::try_from(low).unwrap_or(Decimal::ZERO).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_liquidity_tiers() {
        assert_eq!(SlippageModel::base_slippage(5_000.0), 0.05);
        assert_eq!(SlippageModel::base_slippage(10_000.0), 0.03);
        assert_eq!(SlippageModel::base_slippage(75_000.0), 0.02);
        assert_eq!(SlippageModel::base_slippage(250_000.0), 0.01);
        assert_eq!(SlippageModel::base_slippage(2_000_000.0), 0.005);
    }

    #[test]
    fn test_estimate_components() {
        let model = SlippageModel::default();
        let est = model.estimate(dec!(1000), dec!(100000));

        assert!((est.size_ratio - 0.01).abs() < 1e-12);
        assert!((est.market_impact - 0.01 * 0.01_f64.powf(0.6)).abs() < 1e-12);
        assert!((est.spread_cost - 0.01).abs() < 1e-12);
        assert!((est.total_slippage - (0.01 + est.market_impact)).abs() < 1e-12);
    }

    #[test]
    fn test_total_is_capped() {
        let model = SlippageModel::default();
        let est = model.estimate(dec!(50000), dec!(5000));
        assert_eq!(est.total_slippage, 0.10);

        let est = model.estimate(dec!(100), Decimal::ZERO);
        assert!((est.market_impact - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_fill_price_is_worse_for_both_sides() {
        let model = SlippageModel::default();
        let yes = model.fill_price(Side::Yes, 0.40, dec!(500), dec!(50000));
        let no = model.fill_price(Side::No, 0.40, dec!(500), dec!(50000));

        assert!(yes > 0.40);
        assert!(no > 0.60);
        assert!(model.fill_price(Side::Yes, 0.98, dec!(50000), dec!(1000)) <= 0.99);
    }

    #[test]
    fn test_recommend_position_size_respects_tolerance() {
        let model = SlippageModel::default();
        let size = model.recommend_position_size(dec!(100000), 0.012);

        assert!(size > Decimal::ZERO);
        assert!(model.estimate(size, dec!(100000)).total_slippage <= 0.012);
        assert!(model.estimate(size + dec!(50), dec!(100000)).total_slippage > 0.012);
    }
}
