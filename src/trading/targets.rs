//! Take-profit and stop-loss targets.
//!
//! Prices here are in traded-token space: `entry_price` is what was paid
//! for the token actually held, so the profitable direction is always up.
//! YES-space mirrors are reported alongside for display and for comparing
//! against quotes that arrive as YES prices.

use chrono::{DateTime, Utc};

use crate::models::Side;

use super::{NoTrade, TargetConfig};

/// Take-profit and stop-loss levels for one position.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetLevels {
    pub side: Side,

    /// Entry price of the held token
    pub entry_price: f64,

    /// Edge at entry, signed as given
    pub initial_edge: f64,

    pub capture_ratio: f64,
    pub risk_ratio: f64,

    /// Take-profit move as a fraction of entry
    pub tp_pct: f64,

    /// Take-profit price of the held token
    pub target_price: f64,

    /// Take-profit mirrored into YES space
    pub target_yes_price: f64,

    /// Dollar edge per share locked in at the target
    pub captured_edge: f64,

    /// Target lies within the tradeable price bounds
    pub reachable: bool,

    /// Stop-loss move as a fraction of entry
    pub sl_pct: f64,

    /// Stop-loss price of the held token
    pub stop_price: f64,

    /// Stop-loss mirrored into YES space
    pub stop_yes_price: f64,

    pub stop_reachable: bool,
}

impl TargetLevels {
    /// Take-profit fires when the held token trades at or above target.
    pub fn take_profit_hit(&self, current_price: f64) -> bool {
        self.reachable && current_price >= self.target_price
    }

    /// Stop-loss fires when the held token trades at or below the stop.
    pub fn stop_loss_hit(&self, current_price: f64) -> bool {
        self.stop_reachable && current_price <= self.stop_price
    }

    /// Take-profit check against a YES quote.
    pub fn take_profit_hit_yes(&self, current_yes_price: f64) -> bool {
        self.take_profit_hit(self.side.from_yes_space(current_yes_price))
    }

    /// Stop-loss check against a YES quote.
    pub fn stop_loss_hit_yes(&self, current_yes_price: f64) -> bool {
        self.stop_loss_hit(self.side.from_yes_space(current_yes_price))
    }

    /// The unreachable decision, if the take-profit cannot be hit.
    pub fn unreachable(&self) -> Option<NoTrade> {
        (!self.reachable).then(|| NoTrade::Unreachable {
            target: self.target_price,
        })
    }
}

impl std::fmt::Display for TargetLevels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Take-Profit Summary:")?;
        writeln!(f, "  Side:          {}", self.side)?;
        writeln!(f, "  Entry Price:   ${:.4}", self.entry_price)?;
        writeln!(f, "  Initial Edge:  {:+.1}%", self.initial_edge * 100.0)?;
        writeln!(f, "  Capture Ratio: {:.0}%", self.capture_ratio * 100.0)?;
        writeln!(f, "  Target Move:   {:.2}%", self.tp_pct * 100.0)?;
        writeln!(
            f,
            "  Target Price:  ${:.4} (YES ${:.4})",
            self.target_price, self.target_yes_price
        )?;
        writeln!(f, "  Captured Edge: ${:.4}", self.captured_edge)?;
        writeln!(f, "  Reachable:     {}", if self.reachable { "Yes" } else { "No" })?;
        writeln!(
            f,
            "  Stop Loss:     ${:.4} (YES ${:.4}, -{:.0}%)",
            self.stop_price,
            self.stop_yes_price,
            self.sl_pct * 100.0
        )
    }
}

/// Result of a target computation.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetResult {
    Levels(TargetLevels),
    HoldToResolution(NoTrade),
}

impl TargetResult {
    pub fn levels(&self) -> Option<&TargetLevels> {
        match self {
            TargetResult::Levels(levels) => Some(levels),
            TargetResult::HoldToResolution(_) => None,
        }
    }

    /// Reason the caller should hold to resolution instead of using targets.
    pub fn hold_reason(&self) -> Option<NoTrade> {
        match self {
            TargetResult::Levels(levels) => levels.unreachable(),
            TargetResult::HoldToResolution(reason) => Some(reason.clone()),
        }
    }
}

/// Calculator for take-profit and stop-loss levels.
#[derive(Debug, Clone, Default)]
pub struct TargetCalculator {
    config: TargetConfig,
}

impl TargetCalculator {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Targets with the configured capture and risk ratios.
    pub fn targets(&self, entry_price: f64, side: Side, initial_edge: f64) -> TargetResult {
        self.targets_with(
            entry_price,
            side,
            initial_edge,
            self.config.capture_ratio,
            self.config.risk_ratio,
        )
    }

    /// Targets with explicit ratios.
    ///
    /// TP% = (|edge| * capture) / entry, target = entry * (1 + TP%).
    /// The stop moves the same multiplicative way: stop = entry * (1 - risk).
    pub fn targets_with(
        &self,
        entry_price: f64,
        side: Side,
        initial_edge: f64,
        capture_ratio: f64,
        risk_ratio: f64,
    ) -> TargetResult {
        let open_unit = |x: f64| x.is_finite() && x > 0.0 && x < 1.0;
        if !open_unit(entry_price) {
            return TargetResult::HoldToResolution(NoTrade::InvalidInput(format!(
                "entry price {} not in (0,1)",
                entry_price
            )));
        }
        if !open_unit(capture_ratio) || !open_unit(risk_ratio) || !initial_edge.is_finite() {
            return TargetResult::HoldToResolution(NoTrade::InvalidInput(format!(
                "capture {} and risk {} must be in (0,1)",
                capture_ratio, risk_ratio
            )));
        }

        let edge = initial_edge.abs();
        if edge < self.config.min_edge_threshold {
            return TargetResult::HoldToResolution(NoTrade::NoEdge {
                edge,
                threshold: self.config.min_edge_threshold,
            });
        }
        if entry_price < self.config.min_entry_price || entry_price > self.config.max_entry_price {
            return TargetResult::HoldToResolution(NoTrade::PriceOutOfRange { price: entry_price });
        }

        let tp_pct = edge * capture_ratio / entry_price;
        let target = entry_price + entry_price * tp_pct;
        let stop = entry_price - entry_price * risk_ratio;

        TargetResult::Levels(TargetLevels {
            side,
            entry_price,
            initial_edge: round4(initial_edge),
            capture_ratio,
            risk_ratio,
            tp_pct: round4(tp_pct),
            target_price: round4(target),
            target_yes_price: round4(side.to_yes_space(target)),
            captured_edge: round4(target - entry_price),
            reachable: self.in_bounds(target),
            sl_pct: round4(risk_ratio),
            stop_price: round4(stop),
            stop_yes_price: round4(side.to_yes_space(stop)),
            stop_reachable: self.in_bounds(stop),
        })
    }

    fn in_bounds(&self, price: f64) -> bool {
        price >= self.config.min_target_price && price <= self.config.max_target_price
    }
}

/// Calendar days between entry and exit, never negative.
pub fn holding_days(entry: DateTime<Utc>, exit: DateTime<Utc>) -> i64 {
    (exit.date_naive() - entry.date_naive()).num_days().max(0)
}

pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calc() -> TargetCalculator {
        TargetCalculator::default()
    }

    #[test]
    fn test_yes_target_example() {
        let result = calc().targets(0.40, Side::Yes, 0.10);
        let levels = result.levels().expect("levels");

        assert!((levels.tp_pct - 0.1875).abs() < 1e-9);
        assert!((levels.target_price - 0.475).abs() < 1e-9);
        assert!((levels.target_yes_price - 0.475).abs() < 1e-9);
        assert!((levels.captured_edge - 0.075).abs() < 1e-9);
        assert!(levels.reachable);
        assert!(result.hold_reason().is_none());
    }

    #[test]
    fn test_no_target_when_yes_trades_at_065() {
        // YES at 0.65 against a 0.50 estimate: hold NO bought at 0.35
        let entry = Side::No.token_price(0.65);
        let result = calc().targets(entry, Side::No, 0.15);
        let levels = result.levels().expect("levels");

        assert!((levels.entry_price - 0.35).abs() < 1e-9);
        assert!((levels.tp_pct - 0.3214).abs() < 1e-9);
        assert!((levels.target_price - 0.4625).abs() < 1e-9);
        assert!((levels.target_yes_price - 0.5375).abs() < 1e-9);
        assert!((levels.captured_edge - 0.1125).abs() < 1e-9);
        assert!((levels.stop_price - 0.175).abs() < 1e-9);
        assert!((levels.stop_yes_price - 0.825).abs() < 1e-9);
        assert!(levels.reachable);
    }

    #[test]
    fn test_no_target_from_token_price() {
        // entry is the NO token's own price, not the YES quote
        let result = calc().targets(0.65, Side::No, -0.15);
        let levels = result.levels().expect("levels");

        assert!((levels.target_price - 0.7625).abs() < 1e-9);
        assert!((levels.target_yes_price - 0.2375).abs() < 1e-9);
        assert!(levels.target_price > levels.entry_price);
        assert!((Side::No.from_yes_space(levels.target_yes_price) - levels.target_price).abs() < 1e-9);
    }

    #[test]
    fn test_small_edge_holds_to_resolution() {
        let result = calc().targets(0.40, Side::Yes, 0.04);
        assert!(result.levels().is_none());
        assert!(matches!(
            result,
            TargetResult::HoldToResolution(NoTrade::NoEdge { .. })
        ));

        let result = calc().targets(0.40, Side::Yes, -0.049);
        assert!(result.levels().is_none());
    }

    #[test]
    fn test_extreme_entry_holds_to_resolution() {
        for entry in [0.05, 0.95] {
            let result = calc().targets(entry, Side::Yes, 0.10);
            assert!(matches!(
                result,
                TargetResult::HoldToResolution(NoTrade::PriceOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_ratios() {
        let result = calc().targets_with(0.40, Side::Yes, 0.10, 1.5, 0.5);
        assert!(matches!(
            result,
            TargetResult::HoldToResolution(NoTrade::InvalidInput(_))
        ));
        let result = calc().targets(1.4, Side::Yes, 0.10);
        assert!(matches!(
            result,
            TargetResult::HoldToResolution(NoTrade::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unreachable_target() {
        let result = calc().targets(0.85, Side::Yes, 0.30);
        let levels = result.levels().expect("levels");

        assert!(!levels.reachable);
        assert!(matches!(result.hold_reason(), Some(NoTrade::Unreachable { .. })));
        assert!(!levels.take_profit_hit(0.99));
    }

    #[test]
    fn test_stop_loss_levels() {
        let yes = calc().targets(0.40, Side::Yes, 0.10);
        let levels = yes.levels().expect("levels");
        assert!((levels.stop_price - 0.20).abs() < 1e-9);
        assert!(levels.stop_reachable);

        let no = calc().targets(0.35, Side::No, 0.15);
        let levels = no.levels().expect("levels");
        assert!((levels.stop_price - 0.175).abs() < 1e-9);
        // Stop for a NO holder sits above entry in YES space
        assert!((levels.stop_yes_price - 0.825).abs() < 1e-9);
    }

    #[test]
    fn test_target_always_on_profitable_side() {
        let calc = calc();
        for entry_step in 10..=90 {
            let entry = entry_step as f64 / 100.0;
            for edge_step in [5, 10, 20, 30] {
                let edge = edge_step as f64 / 100.0;
                for side in [Side::Yes, Side::No] {
                    if let Some(levels) = calc.targets(entry, side, edge).levels() {
                        assert!(levels.target_price > levels.entry_price);
                        assert!(levels.stop_price < levels.entry_price);
                    }
                }
            }
        }
    }

    #[test]
    fn test_hit_checks() {
        let result = calc().targets(0.40, Side::Yes, 0.10);
        let levels = result.levels().expect("levels");
        assert!(levels.take_profit_hit(0.48));
        assert!(!levels.take_profit_hit(0.46));
        assert!(levels.stop_loss_hit(0.20));
        assert!(!levels.stop_loss_hit(0.25));

        let result = calc().targets(0.35, Side::No, 0.15);
        let levels = result.levels().expect("levels");
        // NO entry 0.35 targets 0.4625, i.e. YES falling to 0.5375
        assert!(levels.take_profit_hit_yes(0.53));
        assert!(!levels.take_profit_hit_yes(0.60));
        assert!(levels.stop_loss_hit_yes(0.83));
    }

    #[test]
    fn test_holding_days_uses_calendar_days() {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let exit = Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 0).unwrap();
        assert_eq!(holding_days(entry, exit), 4);

        let late = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 0, 1, 0).unwrap();
        assert_eq!(holding_days(late, early), 1);
        assert_eq!(holding_days(exit, entry), 0);
    }

    #[test]
    fn test_summary_display() {
        let result = calc().targets(0.40, Side::Yes, 0.10);
        let text = result.levels().expect("levels").to_string();
        assert!(text.contains("Target Price:  $0.4750"));
        assert!(text.contains("Reachable:     Yes"));
    }
}
