//! Portfolio-level exposure limits and greedy allocation across opportunities.
//!
//! Exposure is tracked as bankroll fractions per market, grouped by
//! category. Positions in the same category are treated as correlated,
//! which is what feeds the sizer's correlation haircut.

use std::collections::HashMap;

use crate::models::Side;

use super::PortfolioConfig;

/// An open position as the portfolio sees it.
#[derive(Debug, Clone)]
pub struct PortfolioPosition {
    pub side: Side,

    /// Bankroll fraction committed
    pub fraction: f64,

    pub expected_return: f64,
    pub variance: f64,
    pub category: String,
}

/// Result of an entry check.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryValidation {
    pub allowed: bool,
    pub reason: String,
}

impl EntryValidation {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: "OK".to_string(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// A candidate trade for allocation.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub market_slug: String,
    pub category: String,
    pub expected_return: f64,
    pub variance: f64,
    pub kelly_fraction: f64,
}

impl Opportunity {
    /// Return per unit of standard deviation; zero when variance is not positive.
    pub fn sharpe(&self) -> f64 {
        if self.variance > 0.0 {
            self.expected_return / self.variance.sqrt()
        } else {
            0.0
        }
    }
}

/// An opportunity with the fraction it was granted.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub opportunity: Opportunity,
    pub sharpe: f64,
    pub allocated_fraction: f64,
}

/// Exposure snapshot handed to the sizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposureSnapshot {
    pub correlated_exposure: f64,
    pub total_exposure: f64,
}

/// Tracks open exposure and enforces category and total limits.
#[derive(Debug, Clone, Default)]
pub struct PortfolioKelly {
    config: PortfolioConfig,
    positions: HashMap<String, PortfolioPosition>,
}

impl PortfolioKelly {
    pub fn new(config: PortfolioConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
        }
    }

    /// Track a position, replacing any previous one in the same market.
    pub fn add_position(&mut self, market_slug: impl Into<String>, position: PortfolioPosition) {
        self.positions.insert(market_slug.into(), position);
    }

    pub fn holds(&self, market_slug: &str) -> bool {
        self.positions.contains_key(market_slug)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Bankroll fraction already committed to `category`.
    pub fn correlated_exposure(&self, category: &str) -> f64 {
        self.positions
            .values()
            .filter(|p| p.category == category)
            .map(|p| p.fraction)
            .sum()
    }

    pub fn total_exposure(&self) -> f64 {
        self.positions.values().map(|p| p.fraction).sum()
    }

    pub fn portfolio_state(&self, category: &str) -> ExposureSnapshot {
        ExposureSnapshot {
            correlated_exposure: self.correlated_exposure(category),
            total_exposure: self.total_exposure(),
        }
    }

    /// Check a new position of `fraction` against category and total limits.
    pub fn can_add_position(&self, fraction: f64, category: &str) -> EntryValidation {
        if self.correlated_exposure(category) + fraction > self.config.max_category_exposure {
            return EntryValidation::deny(format!(
                "Would exceed {} exposure limit ({:.0}%)",
                category,
                self.config.max_category_exposure * 100.0
            ));
        }

        if self.total_exposure() + fraction > self.config.max_total_exposure {
            return EntryValidation::deny(format!(
                "Would exceed total exposure limit ({:.0}%)",
                self.config.max_total_exposure * 100.0
            ));
        }

        EntryValidation::allow()
    }

    /// Greedy allocation by descending Sharpe within category and total limits.
    ///
    /// Each candidate gets the smallest of its Kelly fraction, the room left
    /// in its category and the room left overall, after the positions
    /// already held. Grants at or below the minimum allocation are dropped.
    pub fn optimize_allocation(&self, opportunities: Vec<Opportunity>) -> Vec<Allocation> {
        let mut ranked: Vec<(f64, Opportunity)> = opportunities
            .into_iter()
            .map(|o| (o.sharpe(), o))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut remaining = self.config.max_total_exposure - self.total_exposure();
        let mut category_exposure: HashMap<String, f64> = HashMap::new();
        for position in self.positions.values() {
            *category_exposure.entry(position.category.clone()).or_default() += position.fraction;
        }
        let mut allocated = Vec::new();

        for (sharpe, opp) in ranked {
            let current = category_exposure.get(&opp.category).copied().unwrap_or(0.0);
            let by_category = self.config.max_category_exposure - current;
            let size = by_category.min(remaining).min(opp.kelly_fraction).max(0.0);

            if size > self.config.min_allocation {
                remaining -= size;
                category_exposure.insert(opp.category.clone(), current + size);
                allocated.push(Allocation {
                    opportunity: opp,
                    sharpe,
                    allocated_fraction: size,
                });
            }
        }

        allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(fraction: f64, category: &str) -> PortfolioPosition {
        PortfolioPosition {
            side: Side::Yes,
            fraction,
            expected_return: 0.1,
            variance: 0.04,
            category: category.to_string(),
        }
    }

    fn opportunity(slug: &str, category: &str, er: f64, var: f64, kelly: f64) -> Opportunity {
        Opportunity {
            market_slug: slug.to_string(),
            category: category.to_string(),
            expected_return: er,
            variance: var,
            kelly_fraction: kelly,
        }
    }

    #[test]
    fn test_exposure_by_category() {
        let mut portfolio = PortfolioKelly::default();
        portfolio.add_position("a", position(0.10, "politics"));
        portfolio.add_position("b", position(0.05, "politics"));
        portfolio.add_position("c", position(0.08, "sports"));

        assert!((portfolio.correlated_exposure("politics") - 0.15).abs() < 1e-12);
        assert!((portfolio.correlated_exposure("crypto")).abs() < 1e-12);
        assert!((portfolio.total_exposure() - 0.23).abs() < 1e-12);
        assert_eq!(portfolio.position_count(), 3);

        let snapshot = portfolio.portfolio_state("politics");
        assert!((snapshot.correlated_exposure - 0.15).abs() < 1e-12);
        assert!((snapshot.total_exposure - 0.23).abs() < 1e-12);

        // Replacing a market keeps one position per slug
        portfolio.add_position("a", position(0.02, "politics"));
        assert_eq!(portfolio.position_count(), 3);
        assert!((portfolio.correlated_exposure("politics") - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_can_add_position_limits() {
        let mut portfolio = PortfolioKelly::default();
        portfolio.add_position("a", position(0.25, "politics"));
        portfolio.add_position("b", position(0.20, "sports"));

        let check = portfolio.can_add_position(0.10, "politics");
        assert!(!check.allowed);
        assert_eq!(check.reason, "Would exceed politics exposure limit (30%)");

        let check = portfolio.can_add_position(0.10, "crypto");
        assert!(!check.allowed);
        assert_eq!(check.reason, "Would exceed total exposure limit (50%)");

        let check = portfolio.can_add_position(0.04, "crypto");
        assert_eq!(check, EntryValidation::allow());
    }

    #[test]
    fn test_optimize_allocation_greedy_by_sharpe() {
        let portfolio = PortfolioKelly::default();
        let allocations = portfolio.optimize_allocation(vec![
            opportunity("low", "sports", 0.05, 0.04, 0.20),
            opportunity("high", "politics", 0.20, 0.04, 0.25),
            opportunity("mid", "politics", 0.10, 0.04, 0.25),
            opportunity("tiny", "crypto", 0.08, 0.04, 0.005),
        ]);

        let slugs: Vec<_> = allocations
            .iter()
            .map(|a| a.opportunity.market_slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["high", "mid", "low"]);

        // politics capped at 30%: 0.25 then 0.05
        assert!((allocations[0].allocated_fraction - 0.25).abs() < 1e-12);
        assert!((allocations[1].allocated_fraction - 0.05).abs() < 1e-12);
        // total capped at 50%: 0.20 left for sports
        assert!((allocations[2].allocated_fraction - 0.20).abs() < 1e-12);

        let total: f64 = allocations.iter().map(|a| a.allocated_fraction).sum();
        assert!(total <= 0.5 + 1e-12);
    }

    #[test]
    fn test_optimize_allocation_respects_open_book() {
        let mut portfolio = PortfolioKelly::default();
        portfolio.add_position("held", position(0.20, "politics"));
        portfolio.add_position("other", position(0.15, "sports"));

        let allocations = portfolio.optimize_allocation(vec![
            opportunity("p", "politics", 0.20, 0.04, 0.25),
            opportunity("c", "crypto", 0.10, 0.04, 0.25),
        ]);

        // politics has 10% of room, then 5% is left overall
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].opportunity.market_slug, "p");
        assert!((allocations[0].allocated_fraction - 0.10).abs() < 1e-12);
        assert_eq!(allocations[1].opportunity.market_slug, "c");
        assert!((allocations[1].allocated_fraction - 0.05).abs() < 1e-12);

        portfolio.add_position("full", position(0.15, "crypto"));
        assert!(portfolio
            .optimize_allocation(vec![opportunity("late", "weather", 0.1, 0.04, 0.1)])
            .is_empty());
    }

    #[test]
    fn test_zero_variance_has_zero_sharpe() {
        let opp = opportunity("x", "general", 0.1, 0.0, 0.1);
        assert_eq!(opp.sharpe(), 0.0);
    }
}
