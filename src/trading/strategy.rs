//! Exit rules for open positions: take-profit, stop-loss, holding period, resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Side;

use super::targets::{holding_days, TargetLevels};

/// Exit rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Close positions held longer than this many days (None = hold until resolution)
    pub max_holding_days: Option<i64>,
}

/// Reason for exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    MaxHoldingPeriod,
    Resolved,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "tp",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MaxHoldingPeriod => "max_holding",
            ExitReason::Resolved => "resolved",
            ExitReason::Manual => "manual",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tp" => Ok(ExitReason::TakeProfit),
            "stop_loss" => Ok(ExitReason::StopLoss),
            "max_holding" => Ok(ExitReason::MaxHoldingPeriod),
            "resolved" => Ok(ExitReason::Resolved),
            "manual" => Ok(ExitReason::Manual),
            other => anyhow::bail!("Unknown exit reason '{}'", other),
        }
    }
}

/// An open position under exit monitoring. Prices are in traded-token space.
#[derive(Debug, Clone)]
pub struct MonitoredPosition {
    pub market_slug: String,
    pub side: Side,
    pub entry_price: f64,
    pub shares: Decimal,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

impl MonitoredPosition {
    /// Position with exits taken from computed target levels.
    pub fn with_levels(
        market_slug: impl Into<String>,
        levels: &TargetLevels,
        shares: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            market_slug: market_slug.into(),
            side: levels.side,
            entry_price: levels.entry_price,
            shares,
            tp_price: levels.reachable.then_some(levels.target_price),
            sl_price: levels.stop_reachable.then_some(levels.stop_price),
            opened_at,
        }
    }

    /// P&L if closed at `exit_price` (traded space).
    pub fn pnl_at(&self, exit_price: f64) -> Decimal {
        let diff = Decimal::try_from(exit_price - self.entry_price).unwrap_or(Decimal::ZERO);
        (self.shares * diff).round_dp(2)
    }
}

/// Exit decision.
#[derive(Debug, Clone)]
pub struct ExitSignal {
    pub reason: ExitReason,

    /// Fill price of the held token
    pub exit_price: f64,

    /// Fill price mirrored into YES space
    pub exit_yes_price: f64,

    pub pnl: Decimal,
    pub holding_days: i64,
}

/// Evaluates exit rules against current quotes.
#[derive(Debug, Clone, Default)]
pub struct ExitMonitor {
    config: ExitConfig,
}

impl ExitMonitor {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    /// Check a position against a YES quote.
    ///
    /// Take-profit wins over stop-loss, which wins over the holding limit.
    /// TP and SL fill at their level; the holding limit fills at the quote.
    pub fn check(
        &self,
        position: &MonitoredPosition,
        current_yes_price: f64,
        now: DateTime<Utc>,
    ) -> Option<ExitSignal> {
        let current = position.side.from_yes_space(current_yes_price);
        let days = holding_days(position.opened_at, now);

        let (reason, exit_price) = if let Some(tp) =
            position.tp_price.filter(|tp| current >= *tp)
        {
            (ExitReason::TakeProfit, tp)
        } else if let Some(sl) = position.sl_price.filter(|sl| current <= *sl) {
            (ExitReason::StopLoss, sl)
        } else if self
            .config
            .max_holding_days
            .is_some_and(|limit| days >= limit)
        {
            (ExitReason::MaxHoldingPeriod, current)
        } else {
            return None;
        };

        Some(self.signal(position, reason, exit_price, days))
    }

    /// Settle a position at market resolution (`outcome` is 1 when YES won).
    pub fn settle(&self, position: &MonitoredPosition, outcome: u8, now: DateTime<Utc>) -> ExitSignal {
        let payout = position.side.payout(outcome);
        let days = holding_days(position.opened_at, now);
        self.signal(position, ExitReason::Resolved, payout, days)
    }

    fn signal(
        &self,
        position: &MonitoredPosition,
        reason: ExitReason,
        exit_price: f64,
        holding_days: i64,
    ) -> ExitSignal {
        ExitSignal {
            reason,
            exit_price,
            exit_yes_price: position.side.to_yes_space(exit_price),
            pnl: position.pnl_at(exit_price),
            holding_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn position(side: Side, entry: f64) -> MonitoredPosition {
        MonitoredPosition {
            market_slug: "m".to_string(),
            side,
            entry_price: entry,
            shares: dec!(100),
            tp_price: Some(entry + 0.075),
            sl_price: Some(entry * 0.5),
            opened_at: Utc::now() - Duration::days(3),
        }
    }

    #[test]
    fn test_take_profit_fills_at_target() {
        let monitor = ExitMonitor::default();
        let pos = position(Side::Yes, 0.40);

        let signal = monitor.check(&pos, 0.50, Utc::now()).expect("tp");
        assert_eq!(signal.reason, ExitReason::TakeProfit);
        assert!((signal.exit_price - 0.475).abs() < 1e-9);
        assert_eq!(signal.pnl, dec!(7.50));
        assert_eq!(signal.holding_days, 3);
    }

    #[test]
    fn test_stop_loss_for_no_position() {
        let monitor = ExitMonitor::default();
        // NO token bought at 0.35, stop at 0.175, i.e. YES at 0.825
        let pos = position(Side::No, 0.35);

        assert!(monitor.check(&pos, 0.70, Utc::now()).is_none());

        let signal = monitor.check(&pos, 0.85, Utc::now()).expect("sl");
        assert_eq!(signal.reason, ExitReason::StopLoss);
        assert!((signal.exit_price - 0.175).abs() < 1e-9);
        assert!((signal.exit_yes_price - 0.825).abs() < 1e-9);
        assert_eq!(signal.pnl, dec!(-17.50));
    }

    #[test]
    fn test_max_holding_period() {
        let monitor = ExitMonitor::new(ExitConfig {
            max_holding_days: Some(3),
        });
        let pos = position(Side::Yes, 0.40);

        let signal = monitor.check(&pos, 0.42, Utc::now()).expect("timeout");
        assert_eq!(signal.reason, ExitReason::MaxHoldingPeriod);
        assert!((signal.exit_price - 0.42).abs() < 1e-9);
        assert_eq!(signal.pnl, dec!(2.00));

        assert!(ExitMonitor::default().check(&pos, 0.42, Utc::now()).is_none());
    }

    #[test]
    fn test_settle_at_resolution() {
        let monitor = ExitMonitor::default();
        let yes = position(Side::Yes, 0.40);
        let no = position(Side::No, 0.35);

        assert_eq!(monitor.settle(&yes, 1, Utc::now()).pnl, dec!(60.00));
        assert_eq!(monitor.settle(&yes, 0, Utc::now()).pnl, dec!(-40.00));
        assert_eq!(monitor.settle(&no, 0, Utc::now()).pnl, dec!(65.00));
    }

    #[test]
    fn test_with_levels_drops_unreachable_target() {
        use crate::trading::TargetCalculator;

        let result = TargetCalculator::default().targets(0.85, Side::Yes, 0.30);
        let levels = result.levels().expect("levels");
        let pos = MonitoredPosition::with_levels("m", levels, dec!(10), Utc::now());
        assert!(pos.tp_price.is_none());
        assert!(pos.sl_price.is_some());
    }

    #[test]
    fn test_exit_reason_round_trip() {
        for reason in [
            ExitReason::TakeProfit,
            ExitReason::StopLoss,
            ExitReason::MaxHoldingPeriod,
            ExitReason::Resolved,
            ExitReason::Manual,
        ] {
            assert_eq!(reason.as_str().parse::<ExitReason>().unwrap(), reason);
        }
    }
}
