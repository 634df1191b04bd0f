//! Ensemble edge estimation.
//!
//! Layer one runs every base predictor. Layer two blends them with
//! weights that start fixed and shift toward models whose recent returns
//! have been better, via a softmax over Sharpe-like scores.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::models::Side;

use super::predictor::{PredictionContext, Predictor, MAX_PREDICTION, MIN_PREDICTION};

/// Returns kept per model for reweighting.
const PERFORMANCE_WINDOW: usize = 20;

/// Records a model needs before it is scored.
const MIN_SCORED_RECORDS: usize = 5;

/// Below this |edge| the recommendation is to pass.
const PASS_EDGE: f64 = 0.03;

/// Which probability source a caller trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
    Trend,
    Fundamental,
    Sentiment,
    Ensemble,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Ensemble,
        StrategyKind::Trend,
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::Fundamental,
        StrategyKind::Sentiment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Ensemble => "ensemble",
            StrategyKind::Momentum => "momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Trend => "trend",
            StrategyKind::Fundamental => "fundamental",
            StrategyKind::Sentiment => "sentiment",
        }
    }

    /// The single base model behind this strategy, if it is not the ensemble.
    pub fn predictor(&self) -> Option<Predictor> {
        match self {
            StrategyKind::Momentum => Some(Predictor::Momentum),
            StrategyKind::MeanReversion => Some(Predictor::MeanReversion),
            StrategyKind::Trend => Some(Predictor::Trend),
            StrategyKind::Fundamental => Some(Predictor::Fundamental),
            StrategyKind::Sentiment => Some(Predictor::Sentiment),
            StrategyKind::Ensemble => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ensemble" | "ai" => Ok(StrategyKind::Ensemble),
            "momentum" => Ok(StrategyKind::Momentum),
            "mean_reversion" | "reversion" => Ok(StrategyKind::MeanReversion),
            "trend" | "simple" => Ok(StrategyKind::Trend),
            "fundamental" => Ok(StrategyKind::Fundamental),
            "sentiment" => Ok(StrategyKind::Sentiment),
            other => anyhow::bail!(
                "Unknown strategy '{}' (expected ensemble, trend, momentum, mean_reversion, fundamental or sentiment)",
                other
            ),
        }
    }
}

/// A probability with the estimator's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityEstimate {
    pub probability: f64,
    pub confidence: f64,
}

/// One base model's contribution to an ensemble estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub model: Predictor,
    pub prediction: f64,
    pub confidence: f64,
    pub weight: f64,
}

/// Ensemble estimate for a market.
#[derive(Debug, Clone)]
pub struct EdgeEstimate {
    pub market_slug: String,
    pub question: String,
    pub current_price: f64,

    /// Blended YES probability
    pub probability: f64,

    /// Probability minus YES price
    pub edge: f64,

    /// Model agreement, 1 - min(1, 2 * variance)
    pub confidence: f64,

    /// Expected return per dollar on the favoured side, scaled by confidence
    pub expected_return: f64,

    /// Mean over dispersion of the model predictions
    pub sharpe_ratio: f64,

    pub models: Vec<ModelOutput>,
    pub recommendation: String,
}

impl EdgeEstimate {
    pub fn side(&self) -> Side {
        Side::favoured(self.current_price, self.probability)
    }

    pub fn as_probability(&self) -> ProbabilityEstimate {
        ProbabilityEstimate {
            probability: self.probability,
            confidence: self.confidence,
        }
    }

    /// Individual model predictions keyed by model name.
    pub fn model_predictions(&self) -> BTreeMap<String, f64> {
        self.models
            .iter()
            .map(|m| (m.model.name().to_string(), m.prediction))
            .collect()
    }
}

impl fmt::Display for EdgeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{:=^60}", " ENSEMBLE ESTIMATE ")?;
        writeln!(f, "Market:          {}", self.question)?;
        writeln!(f, "Current Price:   {:.2}%", self.current_price * 100.0)?;
        writeln!(f, "Ensemble Prob:   {:.2}%", self.probability * 100.0)?;
        writeln!(f, "Edge:            {:+.2}%", self.edge * 100.0)?;
        writeln!(f, "Confidence:      {:.0}%", self.confidence * 100.0)?;
        writeln!(f, "Expected Return: {:.2}%", self.expected_return * 100.0)?;
        writeln!(f, "Sharpe:          {:.2}", self.sharpe_ratio)?;
        writeln!(f, "Recommendation:  {}", self.recommendation)?;
        writeln!(f, "\n{:<16} {:>8} {:>6} {:>8}", "Model", "Pred", "Conf", "Weight")?;
        writeln!(f, "{}", "-".repeat(42))?;
        for m in &self.models {
            writeln!(
                f,
                "{:<16} {:>7.2}% {:>5.0}% {:>7.2}%",
                m.model.name(),
                m.prediction * 100.0,
                m.confidence * 100.0,
                m.weight * 100.0
            )?;
        }
        write!(f, "{:=^60}", "")
    }
}

/// Two-layer ensemble estimator.
#[derive(Debug, Clone)]
pub struct EdgeEstimator {
    weights: BTreeMap<Predictor, f64>,
    performance: BTreeMap<Predictor, Vec<f64>>,
}

impl Default for EdgeEstimator {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (Predictor::Trend, 0.25),
            (Predictor::Momentum, 0.25),
            (Predictor::MeanReversion, 0.25),
            (Predictor::Fundamental, 0.15),
            (Predictor::Sentiment, 0.10),
        ]);
        Self {
            weights,
            performance: BTreeMap::new(),
        }
    }
}

impl EdgeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blend every base model into one probability for the market.
    pub fn estimate(&self, market_slug: &str, ctx: &PredictionContext<'_>) -> EdgeEstimate {
        let models: Vec<ModelOutput> = Predictor::ALL
            .iter()
            .map(|model| {
                let pred = model.predict(market_slug, ctx);
                ModelOutput {
                    model: *model,
                    prediction: pred.predicted_price,
                    confidence: pred.confidence,
                    weight: self.weights.get(model).copied().unwrap_or(0.1),
                }
            })
            .collect();

        let total_weight: f64 = models.iter().map(|m| m.weight).sum();
        let blended = if total_weight > 0.0 {
            models.iter().map(|m| m.prediction * m.weight).sum::<f64>() / total_weight
        } else {
            ctx.current_price
        };
        let probability = blended.clamp(MIN_PREDICTION, MAX_PREDICTION);

        let values: Vec<f64> = models.iter().map(|m| m.prediction).collect();
        let variance = values.iter().population_variance();
        let confidence = 1.0 - (variance * 2.0).min(1.0);

        let edge = probability - ctx.current_price;

        EdgeEstimate {
            market_slug: market_slug.to_string(),
            question: ctx.question.to_string(),
            current_price: ctx.current_price,
            probability,
            edge,
            confidence,
            expected_return: expected_return(ctx.current_price, probability, confidence),
            sharpe_ratio: agreement_sharpe(&values),
            models,
            recommendation: recommendation(edge, confidence),
        }
    }

    /// Probability and confidence from the chosen strategy.
    pub fn estimate_with(
        &self,
        strategy: StrategyKind,
        market_slug: &str,
        ctx: &PredictionContext<'_>,
    ) -> ProbabilityEstimate {
        match strategy.predictor() {
            Some(model) => {
                let pred = model.predict(market_slug, ctx);
                ProbabilityEstimate {
                    probability: pred.predicted_price,
                    confidence: pred.confidence,
                }
            }
            None => self.estimate(market_slug, ctx).as_probability(),
        }
    }

    /// Record a realised per-dollar return for one model and reweight.
    pub fn record_model_return(&mut self, model: Predictor, realised: f64) {
        let returns = self.performance.entry(model).or_default();
        returns.push(realised);
        if returns.len() > PERFORMANCE_WINDOW {
            let excess = returns.len() - PERFORMANCE_WINDOW;
            returns.drain(..excess);
        }
        self.update_weights();
    }

    /// Softmax over shifted Sharpe scores once any model has enough history.
    fn update_weights(&mut self) {
        if !self
            .performance
            .values()
            .any(|r| r.len() > MIN_SCORED_RECORDS)
        {
            return;
        }

        let scores: Vec<(Predictor, f64)> = Predictor::ALL
            .iter()
            .map(|model| {
                let score = match self.performance.get(model) {
                    Some(returns) if returns.len() >= MIN_SCORED_RECORDS => {
                        let avg = returns.iter().mean();
                        let std = returns.iter().population_std_dev();
                        if std > 0.0 {
                            avg / std
                        } else {
                            avg
                        }
                    }
                    _ => 0.0,
                };
                (*model, score)
            })
            .collect();

        let min_score = scores
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::INFINITY, f64::min);
        let exp: Vec<(Predictor, f64)> = scores
            .into_iter()
            .map(|(m, s)| (m, (s - min_score + 0.1).exp()))
            .collect();
        let total: f64 = exp.iter().map(|(_, e)| e).sum();

        if total > 0.0 && total.is_finite() {
            self.weights = exp.into_iter().map(|(m, e)| (m, e / total)).collect();
        }
    }
}

/// Expected return per dollar on the favoured side, scaled by confidence.
fn expected_return(yes_price: f64, probability: f64, confidence: f64) -> f64 {
    if yes_price <= 0.01 || yes_price >= 0.99 {
        return 0.0;
    }
    let side = Side::favoured(yes_price, probability);
    let price = side.token_price(yes_price);
    if price <= 0.01 {
        return 0.0;
    }
    let win = side.token_probability(probability);
    let payout = (1.0 - price) / price;
    (win * payout - (1.0 - win)) * confidence
}

fn agreement_sharpe(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let std = values.iter().population_std_dev();
    if std == 0.0 {
        return 2.0;
    }
    values.iter().mean() / std
}

fn recommendation(edge: f64, confidence: f64) -> String {
    if edge.abs() < PASS_EDGE {
        return "PASS: Edge too small (<3%)".to_string();
    }
    if confidence < 0.3 {
        return "CAUTION: Low model confidence".to_string();
    }

    let side = if edge > 0.0 { Side::Yes } else { Side::No };
    let strength = match edge.abs() {
        e if e > 0.10 => "STRONG",
        e if e > 0.05 => "MODERATE",
        _ => "WEAK",
    };
    format!(
        "{} BUY {}: {:.1}% edge with {:.0}% confidence",
        strength,
        side,
        edge.abs() * 100.0,
        confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::PriceHistory;
    use chrono::Utc;

    fn rising_history() -> PriceHistory {
        let mut history = PriceHistory::default();
        let now = Utc::now();
        for p in [0.45, 0.46, 0.47, 0.48, 0.49, 0.50, 0.51, 0.52] {
            history.update("m", p, now);
        }
        history
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let estimator = EdgeEstimator::default();
        let total: f64 = estimator.weights.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((estimator.weights[&Predictor::Fundamental] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_is_weighted_blend() {
        let history = rising_history();
        let ctx = PredictionContext::new(&history, 0.52).with_question("Will it rise?");
        let estimator = EdgeEstimator::default();

        let estimate = estimator.estimate("m", &ctx);
        let manual: f64 = estimate
            .models
            .iter()
            .map(|m| m.prediction * m.weight)
            .sum();

        assert_eq!(estimate.models.len(), 5);
        assert!((estimate.probability - manual).abs() < 1e-9);
        assert!((estimate.edge - (estimate.probability - 0.52)).abs() < 1e-12);
        assert!(estimate.confidence > 0.0 && estimate.confidence <= 1.0);
        assert_eq!(estimate.question, "Will it rise?");
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let history = rising_history();
        let ctx = PredictionContext::new(&history, 0.52);
        let estimator = EdgeEstimator::default();

        let a = estimator.estimate("m", &ctx);
        let b = estimator.estimate("m", &ctx);
        assert_eq!(a.probability, b.probability);
        assert_eq!(a.recommendation, b.recommendation);
    }

    #[test]
    fn test_recommendation_strings() {
        assert_eq!(recommendation(0.02, 0.9), "PASS: Edge too small (<3%)");
        assert_eq!(recommendation(0.08, 0.2), "CAUTION: Low model confidence");
        assert_eq!(
            recommendation(0.12, 0.8),
            "STRONG BUY YES: 12.0% edge with 80% confidence"
        );
        assert_eq!(
            recommendation(-0.06, 0.8),
            "MODERATE BUY NO: 6.0% edge with 80% confidence"
        );
        assert!(recommendation(0.04, 0.8).starts_with("WEAK BUY YES"));
    }

    #[test]
    fn test_expected_return() {
        // YES at 0.40, belief 0.50: 0.5 * 1.5 - 0.5 = 0.25
        assert!((expected_return(0.40, 0.50, 1.0) - 0.25).abs() < 1e-9);
        assert!((expected_return(0.40, 0.50, 0.5) - 0.125).abs() < 1e-9);
        assert_eq!(expected_return(0.995, 0.5, 1.0), 0.0);
    }

    #[test]
    fn test_agreement_sharpe() {
        assert_eq!(agreement_sharpe(&[0.5, 0.5, 0.5]), 2.0);
        assert_eq!(agreement_sharpe(&[0.5]), 0.0);
        assert!(agreement_sharpe(&[0.4, 0.6]) > 0.0);
    }

    #[test]
    fn test_weights_shift_toward_better_model() {
        let mut estimator = EdgeEstimator::default();
        for i in 0..6 {
            let jitter = if i % 2 == 0 { 0.01 } else { -0.01 };
            estimator.record_model_return(Predictor::Momentum, 0.10 + jitter);
            estimator.record_model_return(Predictor::MeanReversion, -0.10 + jitter);
        }

        let weights = &estimator.weights;
        let total: f64 = weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(weights[&Predictor::Momentum] > weights[&Predictor::Trend]);
        assert!(weights[&Predictor::Trend] > weights[&Predictor::MeanReversion]);
    }

    #[test]
    fn test_weights_unchanged_until_enough_history() {
        let mut estimator = EdgeEstimator::default();
        for _ in 0..5 {
            estimator.record_model_return(Predictor::Momentum, 0.2);
        }
        assert!((estimator.weights[&Predictor::Momentum] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("ensemble".parse::<StrategyKind>().unwrap(), StrategyKind::Ensemble);
        assert_eq!(
            "mean-reversion".parse::<StrategyKind>().unwrap(),
            StrategyKind::MeanReversion
        );
        assert!("astrology".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::Momentum.predictor(), Some(Predictor::Momentum));
        assert_eq!(StrategyKind::Ensemble.predictor(), None);
    }

    #[test]
    fn test_estimate_with_single_model() {
        let history = rising_history();
        let ctx = PredictionContext::new(&history, 0.52).with_category("business");
        let estimator = EdgeEstimator::default();

        let est = estimator.estimate_with(StrategyKind::Fundamental, "m", &ctx);
        assert!((est.probability - 0.55).abs() < 1e-12);
        assert!((est.confidence - 0.6).abs() < 1e-12);
    }
}
