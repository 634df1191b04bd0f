//! Paper trading: live Gamma quotes, simulated fills, SQLite ledger.
//!
//! Each cycle estimates every tradeable market, sizes the ones with an edge
//! and opens paper positions with take-profit and stop-loss levels. Exit
//! monitoring closes them on TP/SL or at resolution.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Notify;
use tokio::time::{interval, Interval};
use tracing::{debug, error, info, warn};

use crate::api::GammaClient;
use crate::db::{Database, PaperTrade, PerformanceSummary};
use crate::estimation::{
    EdgeEstimator, PredictionContext, PredictionRecord, PredictionTracker, PriceHistory,
    StrategyKind,
};
use crate::metrics::{Drawdown, PerformanceMetrics};
use crate::models::{Market, Side};
use crate::scanner::{Scanner, ScannerConfig};
use crate::slippage::{SlippageConfig, SlippageModel};
use crate::trading::{
    fraction_of, position_pnl, ExitConfig, ExitMonitor, ExitSignal, KellySizer, Opportunity,
    PortfolioConfig, PortfolioKelly, PortfolioPosition, PositionPnl, SizingConfig, SizingInput,
    TargetCalculator, TargetConfig,
};

/// Paper trading configuration.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Starting paper bankroll
    pub initial_bankroll: Decimal,

    /// Seconds between cycles in `run`
    pub interval_secs: u64,

    /// Markets fetched per cycle
    pub market_limit: u32,

    /// Minimum |probability - price| before sizing
    pub min_edge: f64,

    /// Largest entry slippage accepted; caps size on thin books
    pub max_entry_slippage: f64,

    pub strategy: StrategyKind,
    pub sizing: SizingConfig,
    pub targets: TargetConfig,
    pub portfolio: PortfolioConfig,
    pub scanner: ScannerConfig,
    pub exits: ExitConfig,
    pub slippage: SlippageConfig,

    /// Price history snapshot carried between cycles
    pub history_path: PathBuf,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: dec!(10000), // $10k
            interval_secs: 3600,           // hourly
            market_limit: 100,
            min_edge: 0.05,           // 5 points
            max_entry_slippage: 0.03, // 3%
            strategy: StrategyKind::Ensemble,
            sizing: SizingConfig::default(),
            targets: TargetConfig::default(),
            portfolio: PortfolioConfig::default(),
            scanner: ScannerConfig::default(),
            exits: ExitConfig::default(),
            slippage: SlippageConfig::default(),
            history_path: PathBuf::from("data/price_history.json"),
        }
    }
}

/// Bankroll and drawdown the sizer sees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub bankroll: Decimal,
    pub drawdown: f64,
}

impl AccountState {
    pub fn new(bankroll: Decimal) -> Self {
        Self {
            bankroll,
            drawdown: 0.0,
        }
    }
}

/// A sized entry ready to be booked.
#[derive(Debug, Clone)]
pub struct Signal {
    pub market: Market,
    pub side: Side,

    /// Simulated fill, traded-token space
    pub entry_price: f64,

    pub size: Decimal,
    pub shares: Decimal,

    /// Bankroll fraction of `size`
    pub fraction: f64,

    /// Edge on the traded side
    pub edge: f64,

    /// Estimated YES probability
    pub probability: f64,

    pub confidence: f64,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub model_predictions: BTreeMap<String, f64>,
    pub rationale: String,
}

/// Turns a market quote into a sized signal.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    strategy: StrategyKind,
    min_edge: f64,
    max_entry_slippage: f64,
    estimator: EdgeEstimator,
    sizing: SizingConfig,
    targets: TargetCalculator,
    slippage: SlippageModel,
}

impl SignalGenerator {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            strategy: config.strategy,
            min_edge: config.min_edge,
            max_entry_slippage: config.max_entry_slippage,
            estimator: EdgeEstimator::default(),
            sizing: config.sizing.clone(),
            targets: TargetCalculator::new(config.targets.clone()),
            slippage: SlippageModel::new(config.slippage.clone()),
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Estimate, size and target one market. `None` when there is nothing to do.
    pub fn generate(
        &self,
        market: &Market,
        history: &PriceHistory,
        tracker: &PredictionTracker,
        portfolio: &PortfolioKelly,
        account: &AccountState,
    ) -> Option<Signal> {
        let ctx = PredictionContext::new(history, market.yes_price)
            .with_category(&market.category)
            .with_question(&market.question);

        let (estimate, model_predictions) = match self.strategy {
            StrategyKind::Ensemble => {
                let full = self.estimator.estimate(&market.slug, &ctx);
                (full.as_probability(), full.model_predictions())
            }
            kind => (
                self.estimator.estimate_with(kind, &market.slug, &ctx),
                BTreeMap::new(),
            ),
        };

        let raw_edge = estimate.probability - market.yes_price;
        if raw_edge.abs() < self.min_edge {
            debug!(market = %market.slug, edge = raw_edge, "Edge below minimum");
            return None;
        }

        let exposure = portfolio.portfolio_state(&market.category);
        let sizer = KellySizer::new(self.sizing.clone())
            .with_kelly_multiplier(tracker.kelly_multiplier());
        let input = SizingInput::new(account.bankroll, market.yes_price, estimate.probability)
            .with_confidence(estimate.confidence)
            .with_exposure(exposure.correlated_exposure)
            .with_drawdown(account.drawdown);
        let sizing = sizer.size(&input);

        if let Some(reason) = &sizing.no_trade {
            debug!(
                market = %market.slug,
                reason = reason.tag(),
                detail = %reason,
                total_exposure = exposure.total_exposure,
                "Sizer declined"
            );
            return None;
        }
        if !sizing.is_trade() {
            return None;
        }

        let capacity = self
            .slippage
            .recommend_position_size(market.liquidity, self.max_entry_slippage);
        let size = sizing.position_size.min(capacity);
        if size <= Decimal::ZERO {
            debug!(market = %market.slug, liquidity = %market.liquidity, "Book too thin to enter");
            return None;
        }
        if size < sizing.position_size {
            debug!(
                market = %market.slug,
                requested = %sizing.position_size,
                capped = %size,
                "Position capped by liquidity"
            );
        }

        let fraction = fraction_of(size, account.bankroll);
        let check = portfolio.can_add_position(fraction, &market.category);
        if !check.allowed {
            debug!(market = %market.slug, reason = %check.reason, "Exposure limit");
            return None;
        }

        let entry_price = self
            .slippage
            .fill_price(sizing.side, market.yes_price, size, market.liquidity);
        let fill = Decimal::try_from(entry_price).ok()?;
        if fill <= Decimal::ZERO {
            return None;
        }
        let shares = (size / fill).round_dp(4);

        let targets = self.targets.targets(entry_price, sizing.side, sizing.edge);
        let (tp_price, sl_price) = match targets.levels() {
            Some(levels) => (
                levels.reachable.then_some(levels.target_price),
                levels.stop_reachable.then_some(levels.stop_price),
            ),
            None => (None, None),
        };

        Some(Signal {
            market: market.clone(),
            side: sizing.side,
            entry_price,
            size,
            shares,
            fraction,
            edge: sizing.edge,
            probability: estimate.probability,
            confidence: estimate.confidence,
            tp_price,
            sl_price,
            model_predictions,
            rationale: sizing.rationale,
        })
    }
}

/// Rank candidate signals by Sharpe and trim each to the room the book has left.
///
/// Candidates the allocator drops are not returned.
fn allocate(portfolio: &PortfolioKelly, candidates: Vec<Signal>, bankroll: Decimal) -> Vec<Signal> {
    let opportunities = candidates
        .iter()
        .map(|s| Opportunity {
            market_slug: s.market.slug.clone(),
            category: s.market.category.clone(),
            expected_return: s.edge,
            variance: s.entry_price * (1.0 - s.entry_price),
            kelly_fraction: s.fraction,
        })
        .collect();
    let mut by_slug: HashMap<String, Signal> = candidates
        .into_iter()
        .map(|s| (s.market.slug.clone(), s))
        .collect();

    portfolio
        .optimize_allocation(opportunities)
        .into_iter()
        .filter_map(|allocation| {
            let mut signal = by_slug.remove(&allocation.opportunity.market_slug)?;
            if allocation.allocated_fraction < signal.fraction {
                let size = (bankroll * Decimal::try_from(allocation.allocated_fraction).ok()?)
                    .round_dp(2);
                let fill = Decimal::try_from(signal.entry_price).ok()?;
                signal.shares = (size / fill).round_dp(4);
                signal.size = size;
                signal.fraction = allocation.allocated_fraction;
            }
            debug!(
                market = %signal.market.slug,
                sharpe = allocation.sharpe,
                fraction = signal.fraction,
                "Allocated"
            );
            Some(signal)
        })
        .collect()
}

/// Outcome of one trading cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub markets_scanned: usize,
    pub tradeable: usize,

    /// Sized signals before allocation
    pub candidates: usize,

    pub opened: usize,
}

/// An open trade marked against the last quote seen for its market.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub trade: PaperTrade,
    pub mark: Option<PositionPnl>,
}

/// Paper trading state for `paper status`.
#[derive(Debug, Clone)]
pub struct PaperStats {
    pub initial_bankroll: Decimal,
    pub account: AccountState,
    pub exposure: Decimal,
    pub summary: PerformanceSummary,
    pub metrics: PerformanceMetrics,
    pub max_drawdown: Drawdown,
    pub pending_predictions: usize,
    pub open_positions: Vec<OpenPosition>,
}

impl fmt::Display for PaperStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "\n{:=^60}", " PAPER TRADING STATUS ")?;
        writeln!(f, "Initial Bankroll: ${:.2}", self.initial_bankroll)?;
        writeln!(f, "Bankroll:         ${:.2}", self.account.bankroll)?;
        writeln!(f, "Open Exposure:    ${:.2}", self.exposure)?;
        writeln!(f, "Drawdown:         {:.1}%", self.account.drawdown * 100.0)?;
        writeln!(
            f,
            "Max Drawdown:     {:.1}% (${:.2})",
            self.max_drawdown.pct * 100.0,
            self.max_drawdown.amount
        )?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Trades:           {} ({} open)", s.total_trades, s.open_trades)?;
        writeln!(
            f,
            "Win/Loss:         {}/{} ({:.1}%)",
            s.winning_trades,
            s.losing_trades,
            s.win_rate * 100.0
        )?;
        writeln!(f, "Total P&L:        ${:.2}", s.total_pnl)?;
        writeln!(f, "Avg P&L:          ${:.2}", s.avg_pnl)?;
        writeln!(f, "Avg Edge:         {:.1}%", s.avg_edge * 100.0)?;
        writeln!(f, "Profit Factor:    {:.2}", self.metrics.profit_factor)?;
        writeln!(f, "Sharpe:           {:.2}", self.metrics.sharpe_ratio)?;
        writeln!(f, "Pending Preds:    {}", self.pending_predictions)?;

        if !self.open_positions.is_empty() {
            writeln!(
                f,
                "\n{:<32} {:>4} {:>7} {:>9} {:>6} {:>6} {:>10}",
                "Market", "Side", "Entry", "Size", "TP", "SL", "uP&L"
            )?;
            writeln!(f, "{}", "-".repeat(80))?;
            let dash = || "-".to_string();
            for position in &self.open_positions {
                let t = &position.trade;
                let name: String = t.market_slug.chars().take(32).collect();
                writeln!(
                    f,
                    "{:<32} {:>4} {:>7.3} {:>9.2} {:>6} {:>6} {:>10}",
                    name,
                    t.side,
                    t.entry_price,
                    t.size,
                    t.tp_price.map(|p| format!("{:.3}", p)).unwrap_or_else(dash),
                    t.sl_price.map(|p| format!("{:.3}", p)).unwrap_or_else(dash),
                    position
                        .mark
                        .as_ref()
                        .map(|m| format!("{:+.2}", m.total_pnl))
                        .unwrap_or_else(dash),
                )?;
            }
        }
        write!(f, "{:=^60}", "")
    }
}

/// Stops a running paper loop from another task.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait for the next tick. `false` once stopped, without waiting out the interval.
    async fn tick(&self, ticker: &mut Interval) -> bool {
        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.notify.notified() => false,
            _ = ticker.tick() => !self.is_stopped(),
        }
    }
}

/// Paper trading runner.
pub struct PaperTrader {
    config: PaperConfig,
    db: Database,
    client: GammaClient,
    generator: SignalGenerator,
    scanner: Scanner,
    exits: ExitMonitor,
    history: PriceHistory,
    tracker: PredictionTracker,
    stop: StopHandle,
}

impl PaperTrader {
    /// Restore price history from disk and predictions from the store.
    pub async fn new(config: PaperConfig, db: Database, client: GammaClient) -> Result<Self> {
        let history = if config.history_path.exists() {
            PriceHistory::load(&config.history_path).unwrap_or_else(|e| {
                warn!(error = %e, "Starting with empty price history");
                PriceHistory::default()
            })
        } else {
            PriceHistory::default()
        };
        let tracker = PredictionTracker::new(db.load_predictions().await?);

        info!(
            markets = history.market_count(),
            predictions = tracker.records().len(),
            strategy = %config.strategy,
            "Paper trader initialized"
        );

        Ok(Self {
            generator: SignalGenerator::new(&config),
            scanner: Scanner::new(config.scanner.clone()),
            exits: ExitMonitor::new(config.exits.clone()),
            config,
            db,
            client,
            history,
            tracker,
            stop: StopHandle::default(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Bankroll is the initial stake plus realized P&L; drawdown is off the equity peak.
    pub async fn account(&self) -> Result<AccountState> {
        let summary = self.db.performance_summary().await?;
        let bankroll = self.config.initial_bankroll + summary.total_pnl;

        let peak = self
            .db
            .peak_equity()
            .await?
            .unwrap_or(Decimal::ZERO)
            .max(self.config.initial_bankroll)
            .max(bankroll);

        let drawdown = if peak > Decimal::ZERO {
            ((peak - bankroll) / peak).to_f64().unwrap_or(0.0).max(0.0)
        } else {
            0.0
        };
        Ok(AccountState { bankroll, drawdown })
    }

    /// Exposure book built from the open trades.
    async fn portfolio(&self, bankroll: Decimal) -> Result<PortfolioKelly> {
        let mut portfolio = PortfolioKelly::new(self.config.portfolio.clone());
        for trade in self.db.open_trades().await? {
            let fraction = if bankroll > Decimal::ZERO {
                (trade.size_decimal() / bankroll).to_f64().unwrap_or(0.0)
            } else {
                0.0
            };
            portfolio.add_position(
                trade.market_slug.clone(),
                PortfolioPosition {
                    side: trade.side()?,
                    fraction,
                    expected_return: trade.edge,
                    variance: trade.entry_price * (1.0 - trade.entry_price),
                    category: trade.category.clone(),
                },
            );
        }
        Ok(portfolio)
    }

    /// Fetch, estimate, size and book new positions.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        let markets = self.client.active_markets(self.config.market_limit).await?;
        let now = Utc::now();
        for market in &markets {
            self.history.update(&market.slug, market.yes_price, now);
        }

        let account = self.account().await?;
        let portfolio = self.portfolio(account.bankroll).await?;
        let tradeable = self.scanner.tradeable(&markets, now);
        debug!(
            open = portfolio.position_count(),
            exposure = portfolio.total_exposure(),
            "Portfolio loaded"
        );

        let candidates: Vec<Signal> = tradeable
            .iter()
            .filter(|market| !portfolio.holds(&market.slug))
            .filter_map(|market| {
                self.generator
                    .generate(market, &self.history, &self.tracker, &portfolio, &account)
            })
            .collect();

        let mut summary = CycleSummary {
            markets_scanned: markets.len(),
            tradeable: tradeable.len(),
            candidates: candidates.len(),
            opened: 0,
        };

        for signal in allocate(&portfolio, candidates, account.bankroll) {
            self.book(signal).await?;
            summary.opened += 1;
        }

        if let Err(e) = self.history.save(&self.config.history_path) {
            warn!(error = %e, "Failed to save price history");
        }
        self.record_equity().await?;

        info!(
            scanned = summary.markets_scanned,
            tradeable = summary.tradeable,
            candidates = summary.candidates,
            opened = summary.opened,
            "Cycle complete"
        );
        Ok(summary)
    }

    async fn book(&mut self, signal: Signal) -> Result<()> {
        let strategy = self.generator.strategy().name();
        let trade = PaperTrade::open(
            &signal.market,
            signal.side,
            signal.entry_price,
            signal.size,
            signal.shares,
            signal.edge,
            signal.confidence,
            strategy,
        )
        .with_levels(signal.tp_price, signal.sl_price);
        self.db.save_trade(&trade).await?;

        let mut record = PredictionRecord::new(
            signal.market.slug.clone(),
            signal.market.question.clone(),
            signal.probability,
            signal.market.yes_price,
            signal.side,
            signal.size,
        )
        .with_strategy(strategy)
        .with_models(signal.model_predictions);
        record.id = Some(self.db.save_prediction(&record).await?);
        self.tracker.record_prediction(record);

        info!(
            market = %signal.market.slug,
            side = %signal.side,
            entry = signal.entry_price,
            size = %signal.size,
            edge = signal.edge,
            "Opened paper trade"
        );
        Ok(())
    }

    /// Check open trades against live quotes and close the ones that hit an exit.
    pub async fn monitor_exits(&mut self) -> Result<Vec<(PaperTrade, ExitSignal)>> {
        let open = self.db.open_trades().await?;
        if open.is_empty() {
            return Ok(Vec::new());
        }

        let mut slugs: Vec<String> = open.iter().map(|t| t.market_slug.clone()).collect();
        slugs.sort();
        slugs.dedup();
        let prices: HashMap<String, f64> = self
            .client
            .prices_for(&slugs)
            .await
            .into_iter()
            .filter_map(|(slug, price)| price.map(|p| (slug, p)))
            .collect();

        let now = Utc::now();
        let mut closed = Vec::new();
        for trade in open {
            let Some(yes_price) = prices.get(&trade.market_slug).copied() else {
                debug!(market = %trade.market_slug, "No quote for open trade");
                continue;
            };
            let Some(signal) = self.exits.check(&trade.monitored()?, yes_price, now) else {
                continue;
            };

            self.db
                .close_trade(
                    &trade.id,
                    signal.exit_price,
                    signal.reason,
                    signal.pnl,
                    signal.holding_days,
                )
                .await?;
            info!(
                market = %trade.market_slug,
                reason = signal.reason.as_str(),
                exit = signal.exit_price,
                exit_yes = signal.exit_yes_price,
                pnl = %signal.pnl,
                "Closed paper trade"
            );
            closed.push((trade, signal));
        }

        if !closed.is_empty() {
            self.record_equity().await?;
        }
        Ok(closed)
    }

    /// Settle every open trade and prediction on a resolved market.
    pub async fn resolve(&mut self, market_slug: &str, outcome: u8) -> Result<Vec<PaperTrade>> {
        if outcome > 1 {
            bail!("Outcome must be 0 (NO) or 1 (YES), got {}", outcome);
        }

        let closed = self.db.resolve_market(market_slug, outcome).await?;
        for record in self.tracker.record_outcome(market_slug, outcome) {
            self.db.resolve_prediction(&record).await?;
        }
        self.record_equity().await?;

        info!(market = %market_slug, outcome, closed = closed.len(), "Market resolved");
        Ok(closed)
    }

    pub async fn stats(&self) -> Result<PaperStats> {
        let pnls: Vec<Decimal> = self
            .db
            .closed_trades()
            .await?
            .iter()
            .filter_map(|t| t.pnl_decimal())
            .collect();

        Ok(PaperStats {
            initial_bankroll: self.config.initial_bankroll,
            account: self.account().await?,
            exposure: self.db.current_exposure().await?,
            summary: self.db.performance_summary().await?,
            metrics: PerformanceMetrics::from_pnls(&pnls),
            max_drawdown: self.db.calculate_max_drawdown().await?,
            pending_predictions: self.tracker.unresolved().len(),
            open_positions: self
                .db
                .open_trades()
                .await?
                .into_iter()
                .map(|trade| self.mark(trade))
                .collect(),
        })
    }

    /// Mark an open trade against the latest price in history.
    fn mark(&self, trade: PaperTrade) -> OpenPosition {
        let mark = self
            .history
            .latest(&trade.market_slug)
            .zip(trade.side().ok())
            .zip(Decimal::try_from(trade.shares).ok())
            .map(|((yes_price, side), shares)| {
                position_pnl(side, trade.entry_yes_price, yes_price, shares)
            });
        OpenPosition { trade, mark }
    }

    async fn record_equity(&self) -> Result<()> {
        let account = self.account().await?;
        let exposure = self.db.current_exposure().await?;
        self.db
            .record_equity(
                account.bankroll,
                exposure,
                account.bankroll - self.config.initial_bankroll,
            )
            .await
    }

    /// Cycle plus exit monitoring on an interval until the stop handle fires.
    pub async fn run(&mut self, every: Duration) -> Result<()> {
        info!(interval_secs = every.as_secs(), "Starting paper trading loop");

        let mut ticker = interval(every);
        let stop = self.stop.clone();

        while stop.tick(&mut ticker).await {
            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Error in paper cycle");
            }
            if let Err(e) = self.monitor_exits().await {
                error!(error = %e, "Error in exit monitoring");
            }
        }

        if let Err(e) = self.history.save(&self.config.history_path) {
            warn!(error = %e, "Failed to save price history");
        }
        info!("Paper trading stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::ExitReason;

    fn market(slug: &str, yes: f64) -> Market {
        let mut m = Market::new(slug, "Will it happen?", yes);
        m.liquidity = dec!(100000);
        m.category = "general".to_string();
        m
    }

    fn generator() -> SignalGenerator {
        SignalGenerator::new(&PaperConfig::default())
    }

    fn account() -> AccountState {
        AccountState::new(dec!(10000))
    }

    #[test]
    fn test_longshot_with_edge_signals_yes() {
        let history = PriceHistory::default();
        let tracker = PredictionTracker::new(Vec::new());
        let portfolio = PortfolioKelly::default();

        let signal = generator()
            .generate(&market("cheap", 0.2), &history, &tracker, &portfolio, &account())
            .unwrap();

        assert_eq!(signal.side, Side::Yes);
        assert!(signal.size > Decimal::ZERO);
        assert!(signal.shares > Decimal::ZERO);
        assert!(signal.entry_price > 0.2);
        assert!(signal.tp_price.unwrap() > signal.entry_price);
        assert!(signal.sl_price.unwrap() < signal.entry_price);
        assert!(signal.probability > 0.2);
        assert_eq!(signal.model_predictions.len(), 5);
    }

    #[test]
    fn test_fair_price_no_signal() {
        let history = PriceHistory::default();
        let tracker = PredictionTracker::new(Vec::new());
        let portfolio = PortfolioKelly::default();

        assert!(generator()
            .generate(&market("even", 0.5), &history, &tracker, &portfolio, &account())
            .is_none());
    }

    #[test]
    fn test_category_limit_blocks_signal() {
        let history = PriceHistory::default();
        let tracker = PredictionTracker::new(Vec::new());
        let mut portfolio = PortfolioKelly::default();
        portfolio.add_position(
            "other",
            PortfolioPosition {
                side: Side::Yes,
                fraction: 0.30,
                expected_return: 0.1,
                variance: 0.2,
                category: "general".to_string(),
            },
        );

        assert!(generator()
            .generate(&market("cheap", 0.2), &history, &tracker, &portfolio, &account())
            .is_none());
    }

    #[test]
    fn test_drawdown_halt_blocks_signal() {
        let history = PriceHistory::default();
        let tracker = PredictionTracker::new(Vec::new());
        let portfolio = PortfolioKelly::default();
        let halted = AccountState {
            bankroll: dec!(8000),
            drawdown: 0.25,
        };

        assert!(generator()
            .generate(&market("cheap", 0.2), &history, &tracker, &portfolio, &halted)
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_and_stats() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();

        let config = PaperConfig {
            history_path: std::env::temp_dir().join("polyedge-paper-test-history.json"),
            ..Default::default()
        };
        let mut trader = PaperTrader::new(config, db.clone(), GammaClient::new().unwrap())
            .await
            .unwrap();

        let m = market("cheap", 0.2);
        let trade = PaperTrade::open(&m, Side::Yes, 0.2, dec!(100), dec!(500), 0.075, 0.9, "ensemble");
        db.save_trade(&trade).await.unwrap();

        let closed = trader.resolve("cheap", 1).await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason(), Some(ExitReason::Resolved));

        let stats = trader.stats().await.unwrap();
        assert_eq!(stats.summary.total_trades, 1);
        assert_eq!(stats.account.bankroll, dec!(10400));
        assert_eq!(stats.account.drawdown, 0.0);
        assert!(stats.to_string().contains("PAPER TRADING STATUS"));

        assert!(trader.resolve("cheap", 2).await.is_err());
    }

    async fn trader(db: &Database, name: &str) -> PaperTrader {
        let config = PaperConfig {
            history_path: std::env::temp_dir().join(format!("polyedge-{}-history.json", name)),
            ..Default::default()
        };
        PaperTrader::new(config, db.clone(), GammaClient::new().unwrap())
            .await
            .unwrap()
    }

    fn candidate(slug: &str, category: &str, edge: f64, entry: f64, fraction: f64) -> Signal {
        let mut m = market(slug, entry);
        m.category = category.to_string();
        let size = (dec!(10000) * Decimal::try_from(fraction).unwrap()).round_dp(2);
        Signal {
            market: m,
            side: Side::Yes,
            entry_price: entry,
            size,
            shares: (size / Decimal::try_from(entry).unwrap()).round_dp(4),
            fraction,
            edge,
            probability: entry + edge,
            confidence: 1.0,
            tp_price: None,
            sl_price: None,
            model_predictions: BTreeMap::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_allocate_ranks_and_trims_to_open_book() {
        let mut portfolio = PortfolioKelly::default();
        portfolio.add_position(
            "held",
            PortfolioPosition {
                side: Side::Yes,
                fraction: 0.25,
                expected_return: 0.1,
                variance: 0.2,
                category: "general".to_string(),
            },
        );

        let signals = allocate(
            &portfolio,
            vec![
                candidate("a", "general", 0.10, 0.40, 0.10),
                candidate("b", "sports", 0.20, 0.40, 0.10),
                candidate("dust", "crypto", 0.05, 0.50, 0.005),
            ],
            dec!(10000),
        );

        let slugs: Vec<_> = signals.iter().map(|s| s.market.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a"]);

        // b fits whole
        assert_eq!(signals[0].size, dec!(1000));
        // a only gets the 5% left in its category
        assert!((signals[1].fraction - 0.05).abs() < 1e-9);
        assert_eq!(signals[1].size, dec!(500));
        assert_eq!(signals[1].shares, dec!(1250));
    }

    #[test]
    fn test_thin_book_caps_position() {
        let history = PriceHistory::default();
        let tracker = PredictionTracker::new(Vec::new());
        let portfolio = PortfolioKelly::default();
        let rich = AccountState::new(dec!(1000000));

        let mut thin = market("thin", 0.2);
        thin.liquidity = dec!(1000);
        let deep = market("deep", 0.2);

        let capped = generator()
            .generate(&thin, &history, &tracker, &portfolio, &rich)
            .unwrap();
        let full = generator()
            .generate(&deep, &history, &tracker, &portfolio, &rich)
            .unwrap();

        // search ceiling is 20% of liquidity
        assert!(capped.size > Decimal::ZERO);
        assert!(capped.size <= dec!(200));
        assert!(full.size > capped.size);
        assert!((capped.fraction - capped.size.to_f64().unwrap() / 1_000_000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stop_before_run_returns_without_cycling() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let mut trader = trader(&db, "stop-before").await;

        let handle = trader.stop_handle();
        handle.stop();
        assert!(handle.is_stopped());

        tokio::time::timeout(Duration::from_secs(2), trader.run(Duration::from_secs(3600)))
            .await
            .expect("run should return once stopped")
            .unwrap();
        assert!(db.equity_curve().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_interrupts_interval_wait() {
        let handle = StopHandle::default();
        let mut ticker = interval(Duration::from_secs(3600));

        // first tick is immediate
        assert!(handle.tick(&mut ticker).await);

        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.stop();
        });

        let ticked = tokio::time::timeout(Duration::from_secs(5), handle.tick(&mut ticker))
            .await
            .expect("stop should wake the wait");
        assert!(!ticked);
    }

    #[tokio::test]
    async fn test_drawdown_uses_all_time_peak() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let trader = trader(&db, "peak").await;

        db.record_equity(dec!(12000), Decimal::ZERO, dec!(2000)).await.unwrap();
        for _ in 0..1100 {
            db.record_equity(dec!(10000), Decimal::ZERO, Decimal::ZERO).await.unwrap();
        }

        let account = trader.account().await.unwrap();
        assert_eq!(account.bankroll, dec!(10000));
        assert!((account.drawdown - 2000.0 / 12000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stats_marks_open_positions() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let mut trader = trader(&db, "marks").await;

        let m = market("cheap", 0.2);
        let trade = PaperTrade::open(&m, Side::Yes, 0.2, dec!(100), dec!(500), 0.075, 0.9, "ensemble");
        db.save_trade(&trade).await.unwrap();
        db.save_trade(&PaperTrade::open(
            &market("unquoted", 0.5),
            Side::No,
            0.5,
            dec!(50),
            dec!(100),
            0.1,
            0.9,
            "ensemble",
        ))
        .await
        .unwrap();
        trader.history.update("cheap", 0.3, Utc::now());

        let stats = trader.stats().await.unwrap();
        assert_eq!(stats.open_positions.len(), 2);
        let by_slug = |slug: &str| {
            stats
                .open_positions
                .iter()
                .find(|p| p.trade.market_slug == slug)
                .unwrap()
        };
        assert_eq!(by_slug("cheap").mark.as_ref().map(|m| m.total_pnl), Some(dec!(50)));
        assert!(by_slug("unquoted").mark.is_none());
        assert!(stats.to_string().contains("+50.00"));
    }
}
