//! Market scanner: mispriced books, volume leaders, extreme prices and
//! markets nearing resolution.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Market;

/// Scanner thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Minimum |1 - (yes + no)| reported as arbitrage
    pub arbitrage_threshold: f64,

    /// Minimum volume for the high-volume list
    pub min_volume: Decimal,

    /// Minimum liquidity for value opportunities
    pub value_min_liquidity: Decimal,

    /// YES below this is a longshot
    pub longshot_below: f64,

    /// YES above this is a favorite
    pub favorite_above: f64,

    /// Minimum liquidity for a market to be traded
    pub tradeable_min_liquidity: Decimal,

    /// Tradeable YES range, exclusive
    pub tradeable_min_price: f64,
    pub tradeable_max_price: f64,

    /// Only trade markets resolving within this many days
    pub max_days_to_resolution: Option<i64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            arbitrage_threshold: 0.02,                  // 2 cents
            min_volume: Decimal::from(50_000),          // $50k
            value_min_liquidity: Decimal::from(10_000), // $10k
            longshot_below: 0.15,
            favorite_above: 0.85,
            tradeable_min_liquidity: Decimal::from(50_000), // $50k
            tradeable_min_price: 0.02,
            tradeable_max_price: 0.98,
            max_days_to_resolution: None,
        }
    }
}

/// Market whose YES + NO deviates from $1.00.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    pub slug: String,
    pub question: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub total: f64,
    pub spread: f64,
    pub action: &'static str,
}

/// Extreme-priced market worth a closer look.
#[derive(Debug, Clone, Serialize)]
pub struct ValueOpportunity {
    pub slug: String,
    pub question: String,
    pub price: f64,
    pub kind: &'static str,

    /// Payout multiple if YES resolves: (1 - p) / p
    pub potential_return: f64,
    pub liquidity: Decimal,
}

/// Market that ends within the scan window.
#[derive(Debug, Clone, Serialize)]
pub struct ClosingMarket {
    pub slug: String,
    pub question: String,
    pub yes_price: f64,
    pub volume: Decimal,
    pub end_date: DateTime<Utc>,
    pub days_left: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Markets whose two sides do not sum to $1.00, widest spread first.
    pub fn arbitrage(&self, markets: &[Market]) -> Vec<ArbitrageOpportunity> {
        let mut found: Vec<ArbitrageOpportunity> = markets
            .iter()
            .filter(|m| m.spread() > self.config.arbitrage_threshold)
            .map(|m| {
                let total = m.yes_price + m.no_price;
                ArbitrageOpportunity {
                    slug: m.slug.clone(),
                    question: m.question.clone(),
                    yes_price: m.yes_price,
                    no_price: m.no_price,
                    total,
                    spread: m.spread(),
                    action: if total < 1.0 {
                        "Buy both YES and NO"
                    } else {
                        "Avoid - premium"
                    },
                }
            })
            .collect();
        found.sort_by(|a, b| b.spread.total_cmp(&a.spread));
        found
    }

    /// Markets with at least `min_volume`, busiest first.
    pub fn high_volume<'a>(&self, markets: &'a [Market]) -> Vec<&'a Market> {
        let mut found: Vec<&Market> = markets
            .iter()
            .filter(|m| m.volume >= self.config.min_volume)
            .collect();
        found.sort_by(|a, b| b.volume.cmp(&a.volume));
        found
    }

    /// Liquid markets priced as near-certain longshots or favorites.
    pub fn value(&self, markets: &[Market]) -> Vec<ValueOpportunity> {
        markets
            .iter()
            .filter(|m| m.liquidity >= self.config.value_min_liquidity)
            .filter_map(|m| {
                let p = m.yes_price;
                let kind = if p < self.config.longshot_below {
                    "High confidence longshot"
                } else if p > self.config.favorite_above {
                    "High confidence favorite"
                } else {
                    return None;
                };
                Some(ValueOpportunity {
                    slug: m.slug.clone(),
                    question: m.question.clone(),
                    price: p,
                    kind,
                    potential_return: if p > 0.0 { (1.0 - p) / p } else { 0.0 },
                    liquidity: m.liquidity,
                })
            })
            .collect()
    }

    /// Markets ending within `days` of `now`, soonest first.
    pub fn closing_soon(&self, markets: &[Market], days: i64, now: DateTime<Utc>) -> Vec<ClosingMarket> {
        let cutoff = now + Duration::days(days);
        let mut found: Vec<ClosingMarket> = markets
            .iter()
            .filter_map(|m| {
                let end = m.end_date?;
                (end <= cutoff).then(|| ClosingMarket {
                    slug: m.slug.clone(),
                    question: m.question.clone(),
                    yes_price: m.yes_price,
                    volume: m.volume,
                    end_date: end,
                    days_left: (end - now).num_days(),
                })
            })
            .collect();
        found.sort_by_key(|c| c.end_date);
        found
    }

    /// Whether a market passes the liquidity, price and horizon filters for trading.
    pub fn is_tradeable(&self, market: &Market, now: DateTime<Utc>) -> bool {
        let cfg = &self.config;
        if market.liquidity < cfg.tradeable_min_liquidity {
            return false;
        }
        if market.yes_price <= cfg.tradeable_min_price || market.yes_price >= cfg.tradeable_max_price {
            return false;
        }
        let Some(end) = market.end_date else {
            return false;
        };
        match cfg.max_days_to_resolution {
            Some(max_days) => end > now && end <= now + Duration::days(max_days),
            None => true,
        }
    }

    pub fn tradeable<'a>(&self, markets: &'a [Market], now: DateTime<Utc>) -> Vec<&'a Market> {
        markets.iter().filter(|m| self.is_tradeable(m, now)).collect()
    }

    /// Run every scan.
    pub fn report(&self, markets: &[Market], closing_days: i64, now: DateTime<Utc>) -> ScanReport {
        ScanReport {
            scanned: markets.len(),
            arbitrage: self.arbitrage(markets),
            high_volume: self.high_volume(markets).into_iter().cloned().collect(),
            closing_soon: self.closing_soon(markets, closing_days, now),
            closing_days,
            value: self.value(markets),
        }
    }
}

/// Combined scanner output.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub arbitrage: Vec<ArbitrageOpportunity>,
    pub high_volume: Vec<Market>,
    pub closing_soon: Vec<ClosingMarket>,
    pub closing_days: i64,
    pub value: Vec<ValueOpportunity>,
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=^80}", " MARKET SCANNER ")?;
        writeln!(f, "Scanned {} markets", self.scanned)?;
        writeln!(f)?;

        writeln!(f, "ARBITRAGE (YES + NO != $1.00)")?;
        writeln!(f, "{}", "-".repeat(80))?;
        if self.arbitrage.is_empty() {
            writeln!(f, "  None found")?;
        }
        for opp in self.arbitrage.iter().take(5) {
            writeln!(f, "{}", truncate(&opp.question, 70))?;
            writeln!(
                f,
                "  YES: ${:.2} | NO: ${:.2} | Spread: {:.1}% | {}",
                opp.yes_price,
                opp.no_price,
                opp.spread * 100.0,
                opp.action
            )?;
        }
        writeln!(f)?;

        writeln!(f, "HIGH VOLUME")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for m in self.high_volume.iter().take(10) {
            writeln!(
                f,
                "  {:<56} | YES: ${:.2} | Vol: ${:.0}",
                truncate(&m.question, 56),
                m.yes_price,
                m.volume
            )?;
        }
        writeln!(f)?;

        writeln!(f, "CLOSING WITHIN {} DAYS", self.closing_days)?;
        writeln!(f, "{}", "-".repeat(80))?;
        for c in self.closing_soon.iter().take(10) {
            writeln!(
                f,
                "  {:<50} | {:>3} days | YES: ${:.2}",
                truncate(&c.question, 50),
                c.days_left,
                c.yes_price
            )?;
        }
        writeln!(f)?;

        writeln!(f, "VALUE")?;
        writeln!(f, "{}", "-".repeat(80))?;
        for v in self.value.iter().take(5) {
            writeln!(f, "{}", truncate(&v.question, 70))?;
            writeln!(
                f,
                "  {} | Price: ${:.2} | Return: {:.1}x | Liquidity: ${:.0}",
                v.kind, v.price, v.potential_return, v.liquidity
            )?;
        }
        write!(f, "{}", "=".repeat(80))
    }
}
