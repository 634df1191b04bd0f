//! Backtesting engine for validating estimation strategies against resolved markets.
//!
//! Features:
//! - Replay recorded YES price paths grouped by market
//! - Estimate with any single predictor or the weighted ensemble
//! - Size with the Kelly sizer against the running bankroll and drawdown
//! - Optionally exit early on take-profit / stop-loss along the path
//! - Calculate performance statistics and an equity curve

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::api::parse_end_date;
use crate::estimation::{EdgeEstimator, PredictionContext, PriceHistory, StrategyKind};
use crate::metrics::{max_drawdown, sharpe_sortino, PerformanceMetrics};
use crate::models::Side;
use crate::trading::{
    ExitMonitor, ExitReason, KellySizer, MonitoredPosition, SizingConfig, SizingInput,
    TargetCalculator, TargetConfig,
};

/// Backtesting configuration.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Starting bankroll
    pub initial_bankroll: Decimal,

    /// Minimum |estimate - price| to consider a market
    pub min_edge: f64,

    /// Close early when the path crosses take-profit or stop-loss
    pub use_exits: bool,

    /// Sizing configuration
    pub sizing: SizingConfig,

    /// Target configuration for early exits
    pub targets: TargetConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(10000),
            min_edge: 0.03, // 3% edge
            use_exits: false,
            sizing: SizingConfig::default(),
            targets: TargetConfig::default(),
        }
    }
}

/// One recorded observation of a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(deserialize_with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub market_slug: String,
    #[serde(default)]
    pub question: String,

    /// YES price
    pub price: f64,

    /// 1 = YES, 0 = NO, absent while unresolved
    #[serde(default)]
    pub outcome: Option<u8>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Accepts RFC 3339, naive ISO timestamps (read as UTC) and bare dates.
fn flexible_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .ok()
        .or_else(|| parse_end_date(raw))
}

/// Load historical points from a JSON array file.
pub fn load_history(path: &Path) -> Result<Vec<HistoricalPoint>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// A completed trade in the backtest.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestTrade {
    pub timestamp: DateTime<Utc>,
    pub market_slug: String,
    pub side: Side,

    /// Entry price of the traded token
    pub entry_price: f64,
    pub entry_yes_price: f64,
    pub position_size: Decimal,
    pub shares: Decimal,
    pub estimated_prob: f64,

    /// Edge on the traded side at entry
    pub edge: f64,
    pub actual_outcome: u8,

    /// Exit price of the traded token
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,

    /// P&L / position size
    pub return_pct: f64,
}

/// Backtest results summary.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResults {
    pub strategy: StrategyKind,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub initial_bankroll: Decimal,
    pub final_bankroll: Decimal,

    pub markets_seen: usize,

    /// Markets with data and an outcome that did not clear the edge or sizing filters
    pub skipped_markets: usize,

    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub total_pnl: Decimal,

    /// Total P&L / initial bankroll
    pub total_pnl_pct: f64,
    pub avg_trade_pnl: Decimal,
    pub profit_factor: f64,

    /// Largest bankroll decline from a running peak
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,

    /// Per-trade Sharpe of returns on stake
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    pub take_profit_exits: usize,
    pub stop_loss_exits: usize,

    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<(DateTime<Utc>, Decimal)>,
}

impl BacktestResults {
    /// Write results as pretty JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize results")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl fmt::Display for BacktestResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{:=^60}", " BACKTEST RESULTS ")?;
        writeln!(f)?;
        writeln!(f, "Strategy:    {}", self.strategy)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            writeln!(
                f,
                "Period:      {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            )?;
        }
        writeln!(f)?;
        writeln!(f, "--- Bankroll ---")?;
        writeln!(f, "Initial:     ${:.2}", self.initial_bankroll)?;
        writeln!(f, "Final:       ${:.2}", self.final_bankroll)?;
        writeln!(
            f,
            "Total P&L:   ${:+.2} ({:+.2}%)",
            self.total_pnl,
            self.total_pnl_pct * 100.0
        )?;
        writeln!(f)?;
        writeln!(f, "--- Trades ---")?;
        writeln!(
            f,
            "Total:       {} ({} of {} markets skipped)",
            self.total_trades, self.skipped_markets, self.markets_seen
        )?;
        writeln!(f, "Winners:     {} ({:.1}%)", self.winning_trades, self.win_rate * 100.0)?;
        writeln!(f, "Losers:      {}", self.losing_trades)?;
        writeln!(f, "Avg P&L:     ${:+.2}", self.avg_trade_pnl)?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor)?;
        if self.take_profit_exits + self.stop_loss_exits > 0 {
            writeln!(
                f,
                "Early Exits: {} TP / {} SL",
                self.take_profit_exits, self.stop_loss_exits
            )?;
        }
        writeln!(f)?;
        writeln!(f, "--- Risk Metrics ---")?;
        writeln!(
            f,
            "Max Drawdown: ${:.2} ({:.2}%)",
            self.max_drawdown,
            self.max_drawdown_pct * 100.0
        )?;
        writeln!(f, "Sharpe Ratio: {:.2}", self.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio: {:.2}", self.sortino_ratio)?;
        write!(f, "{:=^60}", "")
    }
}

/// Side-by-side table of strategy results, best P&L first.
pub struct StrategyComparison(pub Vec<BacktestResults>);

impl fmt::Display for StrategyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{:=^70}", " STRATEGY COMPARISON ")?;
        writeln!(
            f,
            "{:<16} {:>12} {:>8} {:>10} {:>8} {:>10}",
            "Strategy", "P&L", "Trades", "Win Rate", "Sharpe", "Max DD"
        )?;
        writeln!(f, "{}", "-".repeat(70))?;
        for r in &self.0 {
            writeln!(
                f,
                "{:<16} {:>12} {:>8} {:>9.1}% {:>8.2} {:>9.2}%",
                r.strategy.name(),
                format!("${:+.2}", r.total_pnl),
                r.total_trades,
                r.win_rate * 100.0,
                r.sharpe_ratio,
                r.max_drawdown_pct * 100.0
            )?;
        }
        write!(f, "{:=^70}", "")
    }
}

/// Backtesting engine.
pub struct Backtester {
    config: BacktestConfig,
    sizer: KellySizer,
    targets: TargetCalculator,
    exits: ExitMonitor,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        let sizer = KellySizer::new(config.sizing.clone());
        let targets = TargetCalculator::new(config.targets.clone());
        Self {
            config,
            sizer,
            targets,
            exits: ExitMonitor::default(),
        }
    }

    /// Run one strategy over the data.
    ///
    /// Each run starts from a fresh estimator, so ensemble weights only
    /// learn from trades settled earlier in the same run.
    pub fn run(&self, data: &[HistoricalPoint], strategy: StrategyKind) -> BacktestResults {
        let markets = group_by_market(data);
        info!(
            points = data.len(),
            markets = markets.len(),
            strategy = %strategy,
            min_edge = self.config.min_edge,
            "Starting backtest"
        );

        let mut estimator = EdgeEstimator::default();
        let mut run = RunState::new(
            self.config.initial_bankroll,
            data.first().map(|p| p.timestamp).unwrap_or_else(Utc::now),
        );

        for (slug, points) in &markets {
            if let Some(trade) = self.process_market(slug, points, strategy, &mut estimator, &run) {
                run.apply(trade);
            } else if points.len() >= 2 && points.last().and_then(|p| p.outcome).is_some() {
                run.skipped += 1;
            }
        }

        let results = run.finish(strategy, markets.len());
        info!(
            strategy = %strategy,
            trades = results.total_trades,
            pnl = %results.total_pnl,
            "Backtest complete"
        );
        results
    }

    /// Run several strategies on the same data, best P&L first.
    pub fn compare_strategies(
        &self,
        data: &[HistoricalPoint],
        strategies: &[StrategyKind],
    ) -> StrategyComparison {
        let mut results: Vec<BacktestResults> =
            strategies.iter().map(|s| self.run(data, *s)).collect();
        results.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl));
        StrategyComparison(results)
    }

    /// Enter at the first observation and hold to resolution (or an early exit).
    ///
    /// The estimator sees every observation except the resolution point, so
    /// later prices inform the entry decision.
    fn process_market(
        &self,
        slug: &str,
        points: &[&HistoricalPoint],
        strategy: StrategyKind,
        estimator: &mut EdgeEstimator,
        run: &RunState,
    ) -> Option<BacktestTrade> {
        if points.len() < 2 {
            return None;
        }
        let entry = points[0];
        let exit = points[points.len() - 1];
        let outcome = exit.outcome?;

        let mut history = PriceHistory::default();
        for p in &points[..points.len() - 1] {
            history.update(slug, p.price, p.timestamp);
        }

        let ctx = PredictionContext::new(&history, entry.price)
            .with_category(&entry.category)
            .with_question(&entry.question);
        let full = estimator.estimate(slug, &ctx);
        let chosen = match strategy {
            StrategyKind::Ensemble => full.as_probability(),
            other => estimator.estimate_with(other, slug, &ctx),
        };

        let edge = chosen.probability - entry.price;
        if edge.abs() < self.config.min_edge {
            debug!(market = %slug, edge, "Edge below minimum");
            return None;
        }

        let input = SizingInput::new(run.bankroll, entry.price, chosen.probability)
            .with_confidence(chosen.confidence)
            .with_drawdown(run.drawdown());
        let sized = self.sizer.size(&input);
        if !sized.is_trade() {
            debug!(market = %slug, reason = %sized.rationale, "Sizer declined");
            return None;
        }

        let mut position = MonitoredPosition {
            market_slug: slug.to_string(),
            side: sized.side,
            entry_price: sized.traded_price,
            shares: sized.shares,
            tp_price: None,
            sl_price: None,
            opened_at: entry.timestamp,
        };

        let mut early_exit = None;
        if self.config.use_exits {
            if let Some(levels) = self
                .targets
                .targets(sized.traded_price, sized.side, sized.edge)
                .levels()
            {
                position = MonitoredPosition::with_levels(slug, levels, sized.shares, entry.timestamp);
            }
            early_exit = points[1..points.len() - 1].iter().find_map(|p| {
                self.exits
                    .check(&position, p.price, p.timestamp)
                    .map(|signal| (signal, p.timestamp))
            });
        }

        let (signal, exit_time) = match early_exit {
            Some(found) => found,
            None => (self.exits.settle(&position, outcome, exit.timestamp), exit.timestamp),
        };

        for model in &full.models {
            if (model.prediction - entry.price).abs() < 1e-9 {
                continue;
            }
            let side = Side::favoured(entry.price, model.prediction);
            let realised = side.payout(outcome) / side.token_price(entry.price) - 1.0;
            estimator.record_model_return(model.model, realised);
        }

        let return_pct = if sized.position_size > Decimal::ZERO {
            (signal.pnl / sized.position_size).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        debug!(
            market = %slug,
            side = %sized.side,
            size = %sized.position_size,
            pnl = %signal.pnl,
            reason = %signal.reason,
            "Closed simulated trade"
        );

        Some(BacktestTrade {
            timestamp: entry.timestamp,
            market_slug: slug.to_string(),
            side: sized.side,
            entry_price: sized.traded_price,
            entry_yes_price: entry.price,
            position_size: sized.position_size,
            shares: sized.shares,
            estimated_prob: chosen.probability,
            edge: sized.edge,
            actual_outcome: outcome,
            exit_price: signal.exit_price,
            exit_reason: signal.reason,
            exit_time,
            pnl: signal.pnl,
            return_pct,
        })
    }
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new(BacktestConfig::default())
    }
}

/// Group points by market, keeping the order markets first appear in.
fn group_by_market(data: &[HistoricalPoint]) -> Vec<(String, Vec<&HistoricalPoint>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&HistoricalPoint>)> = Vec::new();
    for point in data {
        let idx = *index.entry(point.market_slug.as_str()).or_insert_with(|| {
            groups.push((point.market_slug.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(point);
    }
    groups
}

/// Mutable bookkeeping for one run.
struct RunState {
    initial: Decimal,
    bankroll: Decimal,
    peak: Decimal,
    trades: Vec<BacktestTrade>,
    equity_curve: Vec<(DateTime<Utc>, Decimal)>,
    skipped: usize,
}

impl RunState {
    fn new(initial: Decimal, start: DateTime<Utc>) -> Self {
        Self {
            initial,
            bankroll: initial,
            peak: initial,
            trades: Vec::new(),
            equity_curve: vec![(start, initial)],
            skipped: 0,
        }
    }

    fn drawdown(&self) -> f64 {
        if self.peak <= Decimal::ZERO {
            return 0.0;
        }
        ((self.peak - self.bankroll) / self.peak)
            .to_f64()
            .unwrap_or(0.0)
            .max(0.0)
    }

    fn apply(&mut self, trade: BacktestTrade) {
        self.bankroll += trade.pnl;
        if self.bankroll > self.peak {
            self.peak = self.bankroll;
        }
        self.equity_curve.push((trade.exit_time, self.bankroll));
        self.trades.push(trade);
    }

    fn finish(self, strategy: StrategyKind, markets_seen: usize) -> BacktestResults {
        let pnls: Vec<Decimal> = self.trades.iter().map(|t| t.pnl).collect();
        let metrics = PerformanceMetrics::from_pnls(&pnls);

        let curve: Vec<Decimal> = self.equity_curve.iter().skip(1).map(|(_, e)| *e).collect();
        let drawdown = max_drawdown(self.initial, &curve);

        let returns: Vec<f64> = self.trades.iter().map(|t| t.return_pct).collect();
        let (sharpe_ratio, sortino_ratio) = sharpe_sortino(&returns);

        let count_exits = |reason: ExitReason| {
            self.trades
                .iter()
                .filter(|t| t.exit_reason == reason)
                .count()
        };

        let total_pnl_pct = if self.initial > Decimal::ZERO {
            (metrics.total_pnl / self.initial).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        BacktestResults {
            strategy,
            start_date: self.trades.first().map(|t| t.timestamp),
            end_date: self.trades.last().map(|t| t.exit_time),
            initial_bankroll: self.initial,
            final_bankroll: self.bankroll,
            markets_seen,
            skipped_markets: self.skipped,
            total_trades: metrics.total_trades,
            winning_trades: metrics.winning_trades,
            losing_trades: metrics.losing_trades,
            win_rate: metrics.win_rate,
            total_pnl: metrics.total_pnl,
            total_pnl_pct,
            avg_trade_pnl: metrics.expectancy,
            profit_factor: metrics.profit_factor,
            max_drawdown: drawdown.amount,
            max_drawdown_pct: drawdown.pct,
            sharpe_ratio,
            sortino_ratio,
            take_profit_exits: count_exits(ExitReason::TakeProfit),
            stop_loss_exits: count_exits(ExitReason::StopLoss),
            trades: self.trades,
            equity_curve: self.equity_curve,
        }
    }
}
