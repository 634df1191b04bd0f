//! Kelly criterion position sizing with confidence, correlation and drawdown haircuts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::Side;

use super::{NoTrade, SizingConfig};

/// Inputs for one sizing decision.
#[derive(Debug, Clone)]
pub struct SizingInput {
    /// Current bankroll in USDC
    pub bankroll: Decimal,

    /// Market YES price (0.0 to 1.0, exclusive)
    pub yes_price: f64,

    /// Estimated probability of YES (0.0 to 1.0, exclusive)
    pub est_prob: f64,

    /// Confidence in the estimate (0.0 to 1.0)
    pub confidence: f64,

    /// Bankroll fraction already deployed in correlated markets
    pub correlated_exposure: f64,

    /// Current peak-to-trough drawdown (0.0 to 1.0)
    pub drawdown: f64,
}

impl SizingInput {
    /// Input with full confidence and no exposure or drawdown.
    pub fn new(bankroll: Decimal, yes_price: f64, est_prob: f64) -> Self {
        Self {
            bankroll,
            yes_price,
            est_prob,
            confidence: 1.0,
            correlated_exposure: 0.0,
            drawdown: 0.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_exposure(mut self, correlated_exposure: f64) -> Self {
        self.correlated_exposure = correlated_exposure;
        self
    }

    pub fn with_drawdown(mut self, drawdown: f64) -> Self {
        self.drawdown = drawdown;
        self
    }
}

/// Outcome of a sizing decision.
#[derive(Debug, Clone)]
pub struct SizingResult {
    /// Side the estimate favours
    pub side: Side,

    /// Price of the favoured side's token
    pub traded_price: f64,

    /// Traded-side probability minus traded-side price
    pub edge: f64,

    /// Unadjusted Kelly fraction
    pub raw_kelly: f64,

    /// Fraction after multiplier, haircuts and cap
    pub adjusted_fraction: f64,

    /// Dollar size of the position
    pub position_size: Decimal,

    /// Number of tokens bought at `traded_price`
    pub shares: Decimal,

    pub confidence_factor: f64,
    pub correlation_factor: f64,
    pub drawdown_factor: f64,

    /// Which adjustments fired, in order
    pub rationale: String,

    /// Advisory notes for the operator
    pub recommendations: Vec<String>,

    /// Set when the decision is not to trade
    pub no_trade: Option<NoTrade>,
}

impl SizingResult {
    fn declined(side: Side, traded_price: f64, edge: f64, reason: NoTrade) -> Self {
        Self {
            side,
            traded_price,
            edge,
            raw_kelly: 0.0,
            adjusted_fraction: 0.0,
            position_size: Decimal::ZERO,
            shares: Decimal::ZERO,
            confidence_factor: 0.0,
            correlation_factor: 0.0,
            drawdown_factor: 0.0,
            rationale: reason.to_string(),
            recommendations: Vec::new(),
            no_trade: Some(reason),
        }
    }

    /// True when the result carries a positive position.
    pub fn is_trade(&self) -> bool {
        self.no_trade.is_none() && self.position_size > Decimal::ZERO
    }
}

impl std::fmt::Display for SizingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", " POSITION SIZE ")?;
        writeln!(f, "Side:          {} @ ${:.4}", self.side, self.traded_price)?;
        writeln!(f, "Edge:          {:+.2}%", self.edge * 100.0)?;
        writeln!(f, "Raw Kelly:     {:.2}%", self.raw_kelly * 100.0)?;
        writeln!(f, "Adjusted:      {:.2}%", self.adjusted_fraction * 100.0)?;
        writeln!(f, "Position:      ${:.2} ({:.2} shares)", self.position_size, self.shares)?;
        writeln!(f, "Rationale:     {}", self.rationale)?;
        if let Some(reason) = &self.no_trade {
            writeln!(f, "Decision:      NO TRADE ({})", reason)?;
        }
        for rec in &self.recommendations {
            writeln!(f, "  - {}", rec)?;
        }
        write!(f, "{:=^60}", "")
    }
}

/// Kelly sizer. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct KellySizer {
    config: SizingConfig,
}

impl KellySizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Replace the Kelly multiplier, e.g. with a calibration-derived fraction.
    pub fn with_kelly_multiplier(mut self, multiplier: f64) -> Self {
        self.config.kelly_multiplier = multiplier.max(0.0);
        self
    }

    /// Size a position.
    ///
    /// f* = (b * p - q) / b
    /// where:
    ///   p = probability the traded side pays out
    ///   q = 1 - p
    ///   b = net odds, 1 / price - 1
    ///
    /// Haircuts apply in order: confidence, correlation, drawdown. The
    /// result is clamped to `[0, cap_fraction]` before it touches money.
    pub fn size(&self, input: &SizingInput) -> SizingResult {
        if let Some(reason) = validate(input) {
            return SizingResult::declined(Side::Yes, input.yes_price, 0.0, reason);
        }

        let side = Side::favoured(input.yes_price, input.est_prob);
        let price = side.token_price(input.yes_price);
        let p = side.token_probability(input.est_prob);
        let q = 1.0 - p;
        let edge = p - price;

        if edge <= self.config.min_edge {
            let mut result = SizingResult::declined(
                side,
                price,
                edge,
                NoTrade::NoEdge {
                    edge,
                    threshold: self.config.min_edge,
                },
            );
            if edge <= 0.0 {
                result
                    .recommendations
                    .push("Negative expected value - avoid this bet".to_string());
            }
            return result;
        }

        let b = 1.0 / price - 1.0;
        let raw_kelly = (b * p - q) / b;

        let mut notes = vec![format!("kelly {:.4}", raw_kelly)];
        let mut recommendations = Vec::new();

        let mut fraction = raw_kelly;
        if (self.config.kelly_multiplier - 1.0).abs() > f64::EPSILON {
            fraction *= self.config.kelly_multiplier;
            notes.push(format!("multiplier x{:.2}", self.config.kelly_multiplier));
        }

        let confidence_factor = input.confidence.clamp(0.0, 1.0);
        fraction *= confidence_factor;
        if confidence_factor < 1.0 {
            notes.push(format!("confidence x{:.2}", confidence_factor));
        }

        let correlation_factor = self.correlation_factor(input.correlated_exposure);
        fraction *= correlation_factor;
        if correlation_factor < 1.0 {
            notes.push(format!("correlation x{:.2}", correlation_factor));
        }

        let drawdown = input.drawdown.clamp(0.0, 1.0);
        if drawdown >= self.config.max_drawdown {
            let reason = NoTrade::DrawdownHalt {
                drawdown,
                limit: self.config.max_drawdown,
            };
            notes.push("drawdown halt".to_string());
            return SizingResult {
                raw_kelly,
                confidence_factor,
                correlation_factor,
                rationale: notes.join(" | "),
                recommendations: vec!["Max drawdown reached - stop trading".to_string()],
                ..SizingResult::declined(side, price, edge, reason)
            };
        }

        let drawdown_factor = self.drawdown_factor(drawdown);
        fraction *= drawdown_factor;
        if drawdown_factor < 1.0 {
            notes.push(format!("drawdown x{:.2}", drawdown_factor));
            recommendations.push(format!(
                "In drawdown ({:.1}%) - reducing size",
                drawdown * 100.0
            ));
        }

        if fraction > self.config.cap_fraction {
            fraction = self.config.cap_fraction;
            notes.push(format!("capped at {:.2}", self.config.cap_fraction));
        }
        let adjusted_fraction = fraction.max(0.0);

        if edge < self.config.small_edge_warning {
            recommendations.push("Small edge (<5%) - consider passing".to_string());
        }

        let position_size = (input.bankroll
            * Decimal::try_from(adjusted_fraction).unwrap_or(Decimal::ZERO))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        .min(input.bankroll);

        let shares = match Decimal::try_from(price) {
            Ok(px) if px > Decimal::ZERO => (position_size / px).round_dp(4),
            _ => Decimal::ZERO,
        };

        SizingResult {
            side,
            traded_price: price,
            edge,
            raw_kelly,
            adjusted_fraction,
            position_size,
            shares,
            confidence_factor,
            correlation_factor,
            drawdown_factor,
            rationale: notes.join(" | "),
            recommendations,
            no_trade: None,
        }
    }

    /// Correlation haircut: `1 - exposure`, never below the configured floor.
    pub fn correlation_factor(&self, correlated_exposure: f64) -> f64 {
        (1.0 - correlated_exposure.clamp(0.0, 1.0))
            .max(self.config.min_correlation_factor)
            .min(1.0)
    }

    /// Stepwise drawdown haircut. Zero at or above the halt level.
    pub fn drawdown_factor(&self, drawdown: f64) -> f64 {
        if drawdown >= self.config.max_drawdown {
            0.0
        } else if drawdown < self.config.drawdown_half_step {
            1.0
        } else if drawdown <= self.config.drawdown_quarter_step {
            0.5
        } else {
            0.25
        }
    }
}

impl Default for KellySizer {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}

fn validate(input: &SizingInput) -> Option<NoTrade> {
    let open_unit = |x: f64| x.is_finite() && x > 0.0 && x < 1.0;

    if !open_unit(input.yes_price) {
        return Some(NoTrade::InvalidInput(format!(
            "price {} not in (0,1)",
            input.yes_price
        )));
    }
    if !open_unit(input.est_prob) {
        return Some(NoTrade::InvalidInput(format!(
            "probability {} not in (0,1)",
            input.est_prob
        )));
    }
    if input.bankroll <= Decimal::ZERO {
        return Some(NoTrade::InvalidInput(format!(
            "bankroll {} must be positive",
            input.bankroll
        )));
    }
    let finite = [input.confidence, input.correlated_exposure, input.drawdown];
    if finite.iter().any(|v| !v.is_finite()) {
        return Some(NoTrade::InvalidInput(
            "confidence, exposure and drawdown must be finite".to_string(),
        ));
    }
    None
}

/// Bankroll fraction a dollar size represents, as f64.
pub fn fraction_of(size: Decimal, bankroll: Decimal) -> f64 {
    if bankroll <= Decimal::ZERO {
        return 0.0;
    }
    (size / bankroll).to_f64().unwrap_or(0.0)
}
