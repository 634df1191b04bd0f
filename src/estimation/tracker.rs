//! Prediction tracking and calibration.
//!
//! Every traded estimate is logged; when its market resolves the record
//! gets a Brier score and a realised P&L. The calibration report turns
//! the mean Brier score into a recommended Kelly multiplier, which the
//! sizer receives explicitly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::sharpe_sortino;
use crate::models::Side;

/// Kelly multiplier used before any prediction has resolved.
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;

/// A logged prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Store row id, if persisted
    pub id: Option<i64>,

    pub market_slug: String,
    pub question: String,

    /// Estimated probability of YES
    pub predicted_prob: f64,

    /// YES price when the prediction was made
    pub market_price: f64,

    /// predicted_prob - market_price
    pub edge: f64,

    pub side: Side,
    pub position_size: Decimal,
    pub strategy: String,
    pub timestamp: DateTime<Utc>,

    pub resolved: bool,
    pub actual_outcome: Option<u8>,
    pub pnl: Option<Decimal>,
    pub brier_score: Option<f64>,

    /// Individual model predictions, by model name
    #[serde(default)]
    pub model_predictions: BTreeMap<String, f64>,
}

impl PredictionRecord {
    pub fn new(
        market_slug: impl Into<String>,
        question: impl Into<String>,
        predicted_prob: f64,
        market_price: f64,
        side: Side,
        position_size: Decimal,
    ) -> Self {
        Self {
            id: None,
            market_slug: market_slug.into(),
            question: question.into(),
            predicted_prob,
            market_price,
            edge: predicted_prob - market_price,
            side,
            position_size,
            strategy: "ensemble".to_string(),
            timestamp: Utc::now(),
            resolved: false,
            actual_outcome: None,
            pnl: None,
            brier_score: None,
            model_predictions: BTreeMap::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_models(mut self, model_predictions: BTreeMap<String, f64>) -> Self {
        self.model_predictions = model_predictions;
        self
    }

    /// Mark resolved: Brier score and P&L of the stake on `side`.
    pub fn resolve(&mut self, outcome: u8) {
        let outcome = outcome.min(1);
        self.resolved = true;
        self.actual_outcome = Some(outcome);
        self.brier_score = Some((self.predicted_prob - outcome as f64).powi(2));

        let cost = self.side.token_price(self.market_price);
        if cost > 0.0 {
            let per_dollar = (self.side.payout(outcome) - cost) / cost;
            let per_dollar = Decimal::try_from(per_dollar).unwrap_or(Decimal::ZERO);
            self.pnl = Some((per_dollar * self.position_size).round_dp(2));
        }
    }

    fn won(&self) -> bool {
        self.pnl.is_some_and(|p| p > Decimal::ZERO)
    }

    fn has_pnl(&self) -> bool {
        self.pnl.is_some_and(|p| !p.is_zero())
    }
}

/// Observed hit rate within one probability decile.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub predicted_avg: f64,
    pub actual_rate: f64,
    pub count: usize,
}

impl CalibrationBin {
    pub fn bias(&self) -> f64 {
        self.actual_rate - self.predicted_avg
    }
}

/// Win rates split by the sign of the edge at entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeAnalysis {
    pub positive_edge_trades: usize,
    pub positive_edge_win_rate: f64,
    pub negative_edge_trades: usize,
    pub negative_edge_win_rate: f64,
}

/// Brier score of one base model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub mean_brier: f64,
    pub predictions_count: usize,
}

/// Summary of prediction accuracy.
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub total_predictions: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub mean_brier_score: Option<f64>,
    pub total_pnl: Decimal,
    pub avg_pnl_per_trade: Decimal,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub calibration: Vec<CalibrationBin>,
    pub edge_analysis: EdgeAnalysis,
    pub recommended_kelly_fraction: f64,
    pub model_performance: BTreeMap<String, ModelScore>,
}

impl CalibrationReport {
    pub fn has_data(&self) -> bool {
        self.resolved > 0
    }
}

impl fmt::Display for CalibrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{:=^60}", " PREDICTION CALIBRATION ")?;
        if !self.has_data() {
            writeln!(
                f,
                "No resolved predictions yet. Make predictions and wait for markets to resolve."
            )?;
            writeln!(f, "Total predictions logged: {}", self.total_predictions)?;
            return write!(f, "{:=^60}", "");
        }

        writeln!(f, "Total Predictions: {}", self.total_predictions)?;
        writeln!(f, "Resolved: {} | Unresolved: {}", self.resolved, self.unresolved)?;
        writeln!(f)?;
        if let Some(brier) = self.mean_brier_score {
            writeln!(f, "Mean Brier Score:  {:.4} (lower is better)", brier)?;
        }
        writeln!(f, "Total P&L:         ${:+.2}", self.total_pnl)?;
        writeln!(f, "Avg P&L per Trade: ${:+.2}", self.avg_pnl_per_trade)?;
        writeln!(f, "Win Rate:          {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Sharpe Ratio:      {:.2}", self.sharpe_ratio)?;
        writeln!(f)?;

        let ea = &self.edge_analysis;
        writeln!(
            f,
            "Positive Edge: {} trades, {:.1}% won",
            ea.positive_edge_trades,
            ea.positive_edge_win_rate * 100.0
        )?;
        writeln!(
            f,
            "Negative Edge: {} trades, {:.1}% won",
            ea.negative_edge_trades,
            ea.negative_edge_win_rate * 100.0
        )?;
        writeln!(f)?;

        writeln!(f, "{:<10} {:>10} {:>10} {:>8} {:>5}", "Bin", "Predicted", "Actual", "Bias", "n")?;
        for bin in &self.calibration {
            writeln!(
                f,
                "{:.1}-{:.1}    {:>9.1}% {:>9.1}% {:>+7.1}% {:>5}",
                bin.lower,
                bin.upper,
                bin.predicted_avg * 100.0,
                bin.actual_rate * 100.0,
                bin.bias() * 100.0,
                bin.count
            )?;
        }
        writeln!(f)?;

        if !self.model_performance.is_empty() {
            for (model, score) in &self.model_performance {
                writeln!(
                    f,
                    "  {:<16} Brier={:.4} | n={}",
                    model, score.mean_brier, score.predictions_count
                )?;
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "Recommended Kelly Fraction: {:.0}%",
            self.recommended_kelly_fraction * 100.0
        )?;
        write!(f, "{:=^60}", "")
    }
}

/// In-memory view of logged predictions.
#[derive(Debug, Clone)]
pub struct PredictionTracker {
    records: Vec<PredictionRecord>,
    min_fraction: f64,
    max_fraction: f64,
}

impl Default for PredictionTracker {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PredictionTracker {
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self {
            records,
            min_fraction: 0.05,
            max_fraction: 0.50,
        }
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn record_prediction(&mut self, record: PredictionRecord) -> &PredictionRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Resolve every open prediction for a market. Returns the updated records.
    pub fn record_outcome(&mut self, market_slug: &str, outcome: u8) -> Vec<PredictionRecord> {
        self.records
            .iter_mut()
            .filter(|r| r.market_slug == market_slug && !r.resolved)
            .map(|r| {
                r.resolve(outcome);
                r.clone()
            })
            .collect()
    }

    pub fn unresolved(&self) -> Vec<&PredictionRecord> {
        self.records.iter().filter(|r| !r.resolved).collect()
    }

    /// Kelly multiplier to hand the sizer, clamped to the allowed band.
    pub fn kelly_multiplier(&self) -> f64 {
        self.calibration_report()
            .recommended_kelly_fraction
            .clamp(self.min_fraction, self.max_fraction)
    }

    pub fn calibration_report(&self) -> CalibrationReport {
        let resolved: Vec<&PredictionRecord> = self.records.iter().filter(|r| r.resolved).collect();

        let briers: Vec<f64> = resolved.iter().filter_map(|r| r.brier_score).collect();
        let pnls: Vec<Decimal> = resolved.iter().filter_map(|r| r.pnl).collect();

        let mean_brier_score =
            (!briers.is_empty()).then(|| briers.iter().sum::<f64>() / briers.len() as f64);
        let total_pnl: Decimal = pnls.iter().copied().sum();
        let avg_pnl_per_trade = if pnls.is_empty() {
            Decimal::ZERO
        } else {
            (total_pnl / Decimal::from(pnls.len() as u64)).round_dp(2)
        };

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        let (sharpe_ratio, _) = sharpe_sortino(&returns);

        let positive: Vec<&PredictionRecord> =
            resolved.iter().copied().filter(|r| r.edge > 0.0).collect();
        let negative: Vec<&PredictionRecord> =
            resolved.iter().copied().filter(|r| r.edge <= 0.0).collect();

        CalibrationReport {
            total_predictions: self.records.len(),
            resolved: resolved.len(),
            unresolved: self.records.len() - resolved.len(),
            mean_brier_score,
            total_pnl,
            avg_pnl_per_trade,
            sharpe_ratio,
            win_rate: win_rate(&resolved),
            calibration: calibration_bins(&resolved),
            edge_analysis: EdgeAnalysis {
                positive_edge_trades: positive.len(),
                positive_edge_win_rate: win_rate(&positive),
                negative_edge_trades: negative.len(),
                negative_edge_win_rate: win_rate(&negative),
            },
            recommended_kelly_fraction: recommend_kelly(mean_brier_score),
            model_performance: model_performance(&resolved),
        }
    }
}

/// Kelly fraction for a mean Brier score. Random guessing scores 0.25.
pub fn recommend_kelly(mean_brier: Option<f64>) -> f64 {
    match mean_brier {
        None => DEFAULT_KELLY_FRACTION,
        Some(b) if b < 0.10 => 0.50,
        Some(b) if b < 0.15 => 0.35,
        Some(b) if b < 0.20 => 0.25,
        Some(b) if b < 0.25 => 0.15,
        Some(_) => 0.10,
    }
}

/// Share of records with a non-zero P&L that made money.
fn win_rate(records: &[&PredictionRecord]) -> f64 {
    let settled = records.iter().filter(|r| r.has_pnl()).count();
    if settled == 0 {
        return 0.0;
    }
    records.iter().filter(|r| r.won()).count() as f64 / settled as f64
}

fn calibration_bins(resolved: &[&PredictionRecord]) -> Vec<CalibrationBin> {
    let mut bins: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
    for r in resolved {
        if let Some(outcome) = r.actual_outcome {
            let idx = ((r.predicted_prob * 10.0).floor().max(0.0) as usize).min(9);
            bins.entry(idx).or_default().push(outcome);
        }
    }

    bins.into_iter()
        .map(|(idx, outcomes)| {
            let lower = idx as f64 / 10.0;
            let hits = outcomes.iter().map(|&o| o as f64).sum::<f64>();
            CalibrationBin {
                lower,
                upper: lower + 0.1,
                predicted_avg: lower + 0.05,
                actual_rate: hits / outcomes.len() as f64,
                count: outcomes.len(),
            }
        })
        .collect()
}

fn model_performance(resolved: &[&PredictionRecord]) -> BTreeMap<String, ModelScore> {
    let mut briers: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for r in resolved {
        let Some(outcome) = r.actual_outcome else {
            continue;
        };
        for (model, pred) in &r.model_predictions {
            briers
                .entry(model.clone())
                .or_default()
                .push((pred - outcome as f64).powi(2));
        }
    }

    briers
        .into_iter()
        .map(|(model, scores)| {
            let score = ModelScore {
                mean_brier: scores.iter().sum::<f64>() / scores.len() as f64,
                predictions_count: scores.len(),
            };
            (model, score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(slug: &str, prob: f64, price: f64, side: Side) -> PredictionRecord {
        PredictionRecord::new(slug, "q", prob, price, side, dec!(100))
    }

    #[test]
    fn test_resolve_yes_win() {
        let mut r = record("m", 0.70, 0.55, Side::Yes);
        r.resolve(1);

        assert!(r.resolved);
        assert!((r.brier_score.unwrap() - 0.09).abs() < 1e-9);
        // (1 - 0.55) / 0.55 * 100
        assert_eq!(r.pnl, Some(dec!(81.82)));
    }

    #[test]
    fn test_resolve_no_loss() {
        let mut r = record("m", 0.30, 0.45, Side::No);
        r.resolve(1);
        assert_eq!(r.pnl, Some(dec!(-100.00)));
        assert!((r.brier_score.unwrap() - 0.49).abs() < 1e-9);
    }

    #[test]
    fn test_record_outcome_resolves_only_open_records() {
        let mut tracker = PredictionTracker::default();
        tracker.record_prediction(record("a", 0.7, 0.5, Side::Yes));
        tracker.record_prediction(record("a", 0.6, 0.5, Side::Yes));
        tracker.record_prediction(record("b", 0.3, 0.5, Side::No));

        let updated = tracker.record_outcome("a", 1);
        assert_eq!(updated.len(), 2);
        assert!(tracker.record_outcome("a", 1).is_empty());
        assert_eq!(tracker.unresolved().len(), 1);
        assert_eq!(tracker.records().len(), 3);
    }

    #[test]
    fn test_recommend_kelly_table() {
        assert_eq!(recommend_kelly(None), 0.25);
        assert_eq!(recommend_kelly(Some(0.05)), 0.50);
        assert_eq!(recommend_kelly(Some(0.12)), 0.35);
        assert_eq!(recommend_kelly(Some(0.18)), 0.25);
        assert_eq!(recommend_kelly(Some(0.22)), 0.15);
        assert_eq!(recommend_kelly(Some(0.30)), 0.10);
    }

    #[test]
    fn test_empty_report() {
        let tracker = PredictionTracker::default();
        let report = tracker.calibration_report();
        assert!(!report.has_data());
        assert_eq!(report.recommended_kelly_fraction, 0.25);
        assert_eq!(tracker.kelly_multiplier(), 0.25);
        assert!(report.to_string().contains("No resolved predictions"));
    }

    #[test]
    fn test_calibration_report() {
        let mut tracker = PredictionTracker::default();
        let mut a = record("a", 0.72, 0.55, Side::Yes)
            .with_models(BTreeMap::from([("momentum".to_string(), 0.8)]));
        a.resolve(1);
        let mut b = record("b", 0.75, 0.60, Side::Yes);
        b.resolve(0);
        let mut c = record("c", 0.20, 0.35, Side::No);
        c.resolve(0);
        for r in [a, b, c] {
            tracker.record_prediction(r);
        }
        tracker.record_prediction(record("d", 0.6, 0.5, Side::Yes));

        let report = tracker.calibration_report();
        assert_eq!(report.total_predictions, 4);
        assert_eq!(report.resolved, 3);
        assert_eq!(report.unresolved, 1);
        assert!((report.win_rate - 2.0 / 3.0).abs() < 1e-9);

        // 0.0784 + 0.5625 + 0.04
        let brier = report.mean_brier_score.unwrap();
        assert!((brier - 0.6809 / 3.0).abs() < 1e-9);
        assert_eq!(report.recommended_kelly_fraction, 0.15);

        // a and b share the 0.7 bin
        let bin = report
            .calibration
            .iter()
            .find(|b| (b.lower - 0.7).abs() < 1e-9)
            .unwrap();
        assert_eq!(bin.count, 2);
        assert!((bin.actual_rate - 0.5).abs() < 1e-9);

        assert_eq!(report.edge_analysis.positive_edge_trades, 2);
        assert_eq!(report.edge_analysis.negative_edge_trades, 1);
        assert!((report.model_performance["momentum"].mean_brier - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_kelly_multiplier_is_clamped() {
        let mut tracker = PredictionTracker::default();
        let mut r = record("a", 0.95, 0.5, Side::Yes);
        r.resolve(1);
        tracker.record_prediction(r);
        assert_eq!(tracker.kelly_multiplier(), 0.50);
    }
}
