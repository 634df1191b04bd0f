//! Heuristic price predictors.
//!
//! A fixed set of models, each turning a market's recent price history
//! into a next-price forecast with a confidence. The forecast doubles as
//! a probability estimate for the YES outcome.

use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::PriceHistory;

/// Forecast bounds; no model predicts outside them.
pub const MIN_PREDICTION: f64 = 0.05;
pub const MAX_PREDICTION: f64 = 0.95;

/// Direction a model expects the price to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Output of a single predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePrediction {
    pub model: Predictor,
    pub predicted_price: f64,
    pub confidence: f64,
    pub trend: Trend,
    pub insufficient_data: bool,
}

/// What a predictor may look at.
#[derive(Debug, Clone, Copy)]
pub struct PredictionContext<'a> {
    pub history: &'a PriceHistory,
    pub current_price: f64,
    pub category: &'a str,
    pub question: &'a str,
}

impl<'a> PredictionContext<'a> {
    pub fn new(history: &'a PriceHistory, current_price: f64) -> Self {
        Self {
            history,
            current_price,
            category: "general",
            question: "",
        }
    }

    pub fn with_category(mut self, category: &'a str) -> Self {
        self.category = category;
        self
    }

    pub fn with_question(mut self, question: &'a str) -> Self {
        self.question = question;
        self
    }
}

/// The available base models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predictor {
    /// Short vs long moving average crossover
    Momentum,
    /// Pull toward 0.50
    MeanReversion,
    /// Momentum nudge with extreme-price reversion and volatility dampening
    Trend,
    /// Category base rates
    Fundamental,
    /// Neutral placeholder for text sentiment
    Sentiment,
}

const MOMENTUM_SHORT: usize = 3;
const MOMENTUM_LONG: usize = 10;
const REVERSION_MEAN: f64 = 0.5;
const REVERSION_MIN_POINTS: usize = 5;
const TREND_LOOKBACK: usize = 10;
const TREND_SHORT: usize = 5;
const TREND_MIN_POINTS: usize = 5;

impl Predictor {
    pub const ALL: [Predictor; 5] = [
        Predictor::Trend,
        Predictor::Momentum,
        Predictor::MeanReversion,
        Predictor::Fundamental,
        Predictor::Sentiment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Predictor::Momentum => "momentum",
            Predictor::MeanReversion => "mean_reversion",
            Predictor::Trend => "trend",
            Predictor::Fundamental => "fundamental",
            Predictor::Sentiment => "sentiment",
        }
    }

    /// Forecast the next YES price for `market_slug`.
    pub fn predict(&self, market_slug: &str, ctx: &PredictionContext<'_>) -> PricePrediction {
        match self {
            Predictor::Momentum => self.momentum(&ctx.history.all_prices(market_slug), ctx),
            Predictor::MeanReversion => {
                self.mean_reversion(&ctx.history.all_prices(market_slug), ctx)
            }
            Predictor::Trend => self.trend(&ctx.history.all_prices(market_slug), ctx),
            Predictor::Fundamental => PricePrediction {
                model: *self,
                predicted_price: base_rate(ctx.category),
                confidence: 0.6,
                trend: Trend::Neutral,
                insufficient_data: false,
            },
            Predictor::Sentiment => PricePrediction {
                model: *self,
                predicted_price: 0.5,
                confidence: 0.5,
                trend: Trend::Neutral,
                insufficient_data: false,
            },
        }
    }

    fn fallback(&self, prices: &[f64], ctx: &PredictionContext<'_>, confidence: f64) -> PricePrediction {
        PricePrediction {
            model: *self,
            predicted_price: clip(prices.last().copied().unwrap_or(ctx.current_price)),
            confidence,
            trend: Trend::Neutral,
            insufficient_data: true,
        }
    }

    fn momentum(&self, prices: &[f64], ctx: &PredictionContext<'_>) -> PricePrediction {
        if prices.len() < MOMENTUM_LONG {
            return self.fallback(prices, ctx, 0.2);
        }

        let short_ma = tail(prices, MOMENTUM_SHORT).mean();
        let long_ma = tail(prices, MOMENTUM_LONG).mean();
        let momentum = if long_ma > 0.0 {
            (short_ma - long_ma) / long_ma
        } else {
            0.0
        };

        let current = prices[prices.len() - 1];
        PricePrediction {
            model: *self,
            predicted_price: clip(current + momentum * current * 0.5),
            confidence: (0.5 + momentum.abs() * 2.0).min(0.9),
            trend: banded(momentum, 0.02),
            insufficient_data: false,
        }
    }

    fn mean_reversion(&self, prices: &[f64], ctx: &PredictionContext<'_>) -> PricePrediction {
        if prices.len() < REVERSION_MIN_POINTS {
            return self.fallback(prices, ctx, 0.2);
        }

        let current = prices[prices.len() - 1];
        let distance = current - REVERSION_MEAN;
        let predicted = if distance == 0.0 {
            current
        } else {
            current - distance.signum() * distance.abs() * 0.3
        };

        // Above the mean the expected move is down
        let trend = if distance > 0.1 {
            Trend::Down
        } else if distance < -0.1 {
            Trend::Up
        } else {
            Trend::Neutral
        };

        PricePrediction {
            model: *self,
            predicted_price: clip(predicted),
            confidence: (0.4 + distance.abs() * 0.8).min(0.9),
            trend,
            insufficient_data: false,
        }
    }

    fn trend(&self, prices: &[f64], ctx: &PredictionContext<'_>) -> PricePrediction {
        if prices.len() < TREND_MIN_POINTS {
            return self.fallback(prices, ctx, 0.3);
        }

        let current = prices[prices.len() - 1];
        let recent = tail(prices, TREND_SHORT);
        let momentum = if recent[0] > 0.0 {
            (recent[recent.len() - 1] - recent[0]) / recent[0]
        } else {
            0.0
        };
        let volatility = tail(prices, TREND_LOOKBACK).population_std_dev();

        let mut predicted = current + momentum * 0.05;

        if current > 0.85 {
            predicted -= volatility * 0.3;
        } else if current < 0.15 {
            predicted += volatility * 0.3;
        }

        if (0.20..=0.80).contains(&current) && momentum.abs() > 0.05 {
            predicted += momentum * 0.03;
        }

        if volatility > 0.1 {
            predicted = 0.7 * predicted + 0.3 * current;
        }

        let data_confidence = (prices.len() as f64 / 20.0).min(1.0);
        let vol_confidence = (1.0 - volatility * 5.0).max(0.0);
        let extreme_penalty = 1.0 - (current - 0.5).abs() * 0.5;
        let confidence =
            (data_confidence * 0.4 + vol_confidence * 0.4 + extreme_penalty * 0.2).clamp(0.1, 0.95);

        PricePrediction {
            model: *self,
            predicted_price: clip(predicted),
            confidence,
            trend: banded(momentum, 0.03),
            insufficient_data: false,
        }
    }
}

impl fmt::Display for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Historical YES base rate for a market category.
pub fn base_rate(category: &str) -> f64 {
    match category {
        "politics" => 0.50,
        "sports_favorite" => 0.60,
        "sports_underdog" => 0.40,
        "crypto" => 0.45,
        "entertainment" => 0.50,
        "business" => 0.55,
        _ => 0.50,
    }
}

fn tail(prices: &[f64], n: usize) -> &[f64] {
    &prices[prices.len().saturating_sub(n)..]
}

fn clip(price: f64) -> f64 {
    price.clamp(MIN_PREDICTION, MAX_PREDICTION)
}

fn banded(momentum: f64, band: f64) -> Trend {
    if momentum > band {
        Trend::Up
    } else if momentum < -band {
        Trend::Down
    } else {
        Trend::Neutral
    }
}
