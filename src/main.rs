//! Polymarket position sizing and target engine
//!
//! Kelly sizing with confidence, correlation and drawdown haircuts,
//! take-profit and stop-loss targeting, plus the scanner, estimators,
//! backtester and paper-trading ledger that drive them.

mod alerts;
mod api;
mod backtest;
mod config;
mod db;
mod estimation;
mod metrics;
mod models;
mod paper;
mod scanner;
mod slippage;
mod trading;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::alerts::{AlertCondition, AlertMonitor};
use crate::api::GammaClient;
use crate::backtest::{load_history, BacktestConfig, Backtester};
use crate::config::{AppConfig, DEFAULT_DATABASE_URL};
use crate::db::Database;
use crate::estimation::{EdgeEstimator, PredictionContext, PredictionTracker, PriceHistory, StrategyKind};
use crate::models::Side;
use crate::paper::{PaperConfig, PaperTrader};
use crate::scanner::{Scanner, ScannerConfig};
use crate::trading::odds::{
    edge_strength, expected_profit, expected_value, implied_probability_from_american,
    implied_probability_from_decimal,
};
use crate::trading::{
    KellySizer, SizingInput, SizingResult, TargetCalculator, TargetLevels, TargetResult,
};

/// Prediction market sizing and paper-trading CLI.
#[derive(Parser)]
#[command(name = "polyedge")]
#[command(about = "Kelly sizing and take-profit targets for Polymarket", long_about = None)]
struct Cli {
    /// Database URL
    #[arg(short, long, env = "POLYEDGE_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Size a position with fractional Kelly
    Size {
        /// Bankroll in USDC (defaults to POLYEDGE_BANKROLL)
        #[arg(short, long)]
        bankroll: Option<f64>,

        /// Current YES price
        #[arg(short, long)]
        price: f64,

        /// Estimated YES probability
        #[arg(long)]
        prob: f64,

        /// Confidence in the estimate (0-1)
        #[arg(short, long, default_value = "1.0")]
        confidence: f64,

        /// Existing exposure in the same category, as a bankroll fraction
        #[arg(short, long, default_value = "0.0")]
        exposure: f64,

        /// Current drawdown from peak (0-1)
        #[arg(short, long, default_value = "0.0")]
        drawdown: f64,

        /// Use the Kelly multiplier recommended by prediction calibration
        #[arg(long)]
        calibrated: bool,
    },

    /// Take-profit and stop-loss levels for an entry
    Targets {
        /// Entry price of the traded token
        #[arg(short, long)]
        entry: f64,

        /// Traded side (YES or NO)
        #[arg(short, long, default_value = "YES")]
        side: String,

        /// Initial edge (probability minus price)
        #[arg(long)]
        edge: f64,

        /// Share of the edge to capture
        #[arg(long)]
        capture: Option<f64>,

        /// Share of the entry price to risk
        #[arg(long)]
        risk: Option<f64>,

        /// Current YES quote to check the levels against
        #[arg(long)]
        current: Option<f64>,
    },

    /// Expected value and Kelly summary
    Ev {
        /// Current YES price
        #[arg(short, long)]
        price: f64,

        /// Estimated YES probability
        #[arg(long, required_unless_present_any = ["decimal_odds", "american_odds"])]
        prob: Option<f64>,

        /// Take the estimate from decimal odds on YES (2.50 = 40%)
        #[arg(long, conflicts_with_all = ["prob", "american_odds"])]
        decimal_odds: Option<f64>,

        /// Take the estimate from American odds on YES (+150, -200)
        #[arg(long, allow_negative_numbers = true, conflicts_with = "prob")]
        american_odds: Option<i32>,

        /// Stake for the expected profit line
        #[arg(short, long, default_value = "100")]
        stake: f64,
    },

    /// Scan active markets for opportunities
    Scan {
        /// Number of markets to fetch
        #[arg(short, long, default_value = "100")]
        limit: u32,

        /// Window for the closing-soon section, in days
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Probability estimate for a live market
    Estimate {
        /// Market slug
        slug: String,

        /// Estimation strategy
        #[arg(short, long, default_value = "ensemble")]
        strategy: String,
    },

    /// Replay historical prices through the estimator and sizer
    Backtest {
        /// JSON file of historical points
        #[arg(long)]
        data: PathBuf,

        /// Estimation strategy
        #[arg(short, long, default_value = "ensemble")]
        strategy: String,

        /// Run every strategy and compare
        #[arg(long)]
        compare: bool,

        /// Initial bankroll (defaults to POLYEDGE_BANKROLL)
        #[arg(short, long)]
        bankroll: Option<f64>,

        /// Minimum edge to enter
        #[arg(long, default_value = "0.03")]
        min_edge: f64,

        /// Exit early on take-profit / stop-loss
        #[arg(long)]
        exits: bool,

        /// Write results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Paper trading against live quotes
    Paper {
        #[command(subcommand)]
        action: PaperCommand,
    },

    /// Prediction calibration report
    Calibration,

    /// Price alerts
    Alert {
        #[command(subcommand)]
        action: AlertCommand,
    },
}

#[derive(Subcommand)]
enum PaperCommand {
    /// Run the trading loop until Ctrl+C
    Run {
        /// Seconds between cycles
        #[arg(short, long)]
        interval: Option<u64>,

        /// Estimation strategy
        #[arg(short, long, default_value = "ensemble")]
        strategy: String,

        /// Only trade markets resolving within this many days
        #[arg(long)]
        max_days: Option<i64>,
    },

    /// Run a single cycle
    Cycle {
        /// Estimation strategy
        #[arg(short, long, default_value = "ensemble")]
        strategy: String,

        /// Only trade markets resolving within this many days
        #[arg(long)]
        max_days: Option<i64>,
    },

    /// Check open positions for exits once
    Monitor,

    /// Settle a resolved market
    Resolve {
        /// Market slug
        slug: String,

        /// 1 if YES won, 0 if NO won
        outcome: u8,
    },

    /// Show paper trading stats
    Status,

    /// Remove a trade from the ledger
    Delete {
        /// Trade id
        id: String,
    },
}

#[derive(Subcommand)]
enum AlertCommand {
    /// Add an alert
    Add {
        /// Market slug
        slug: String,

        /// above, below or changes_by
        condition: String,

        /// Price level, or percent move for changes_by
        threshold: f64,
    },

    /// List alerts
    List,

    /// Check alerts once
    Check,

    /// Re-arm a fired alert
    Reset { id: i64 },

    /// Delete an alert
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(cli.log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let app = AppConfig::from_env()?;

    match cli.command {
        Commands::Size {
            bankroll,
            price,
            prob,
            confidence,
            exposure,
            drawdown,
            calibrated,
        } => {
            let bankroll = match bankroll {
                Some(b) => Decimal::try_from(b)?,
                None => app.bankroll,
            };

            let mut sizer = KellySizer::new(app.sizing.clone());
            if calibrated {
                let db = open_db(&cli.database).await?;
                let tracker = PredictionTracker::new(db.load_predictions().await?);
                let multiplier = tracker.kelly_multiplier();
                info!(multiplier, "Using calibrated Kelly multiplier");
                sizer = sizer.with_kelly_multiplier(multiplier);
            }

            let input = SizingInput::new(bankroll, price, prob)
                .with_confidence(confidence)
                .with_exposure(exposure)
                .with_drawdown(drawdown);
            let result = sizer.size(&input);
            print_sizing(bankroll, price, prob, &result);

            if result.is_trade() {
                let targets = TargetCalculator::new(app.targets.clone()).targets(
                    result.traded_price,
                    result.side,
                    result.edge,
                );
                print_targets(&targets, None);
            }
        }

        Commands::Targets {
            entry,
            side,
            edge,
            capture,
            risk,
            current,
        } => {
            let side: Side = side.parse()?;
            let calculator = TargetCalculator::new(app.targets.clone());
            let cfg = calculator.config();
            let result = calculator.targets_with(
                entry,
                side,
                edge,
                capture.unwrap_or(cfg.capture_ratio),
                risk.unwrap_or(cfg.risk_ratio),
            );
            print_targets(&result, current);
        }

        Commands::Ev {
            price,
            prob,
            decimal_odds,
            american_odds,
            stake,
        } => {
            let prob = estimate_from(prob, decimal_odds, american_odds)?;
            let side = Side::favoured(price, prob);
            let sizer = KellySizer::new(app.sizing.clone());
            let result = sizer.size(&SizingInput::new(app.bankroll, price, prob));

            println!("\n{:=^60}", " EXPECTED VALUE ");
            println!("YES Price:        {:.3}", price);
            println!("Your Estimate:    {:.1}%", prob * 100.0);
            println!("Favoured Side:    {} @ {:.3}", side, side.token_price(price));
            println!("Edge:             {:+.1}% ({})", (prob - price) * 100.0, edge_strength(price, prob));
            println!("EV per Share:     ${:+.4}", expected_value(price, prob));
            println!(
                "Expected Profit:  ${:+.2} on ${:.2}",
                expected_profit(Decimal::try_from(stake)?, price, prob),
                stake
            );
            println!("Full Kelly:       {:.2}%", result.raw_kelly * 100.0);
            println!("Half Kelly:       {:.2}%", result.raw_kelly * 50.0);
            println!("Quarter Kelly:    {:.2}%", result.raw_kelly * 25.0);
            if let Some(reason) = &result.no_trade {
                println!("Decision:         NO TRADE ({})", reason);
            }
            println!("{:=^60}", "");
        }

        Commands::Scan { limit, days } => {
            let client = GammaClient::with_base_url(app.gamma_url.clone())?;
            let markets = client.active_markets(limit).await?;
            info!(markets = markets.len(), "Fetched active markets");

            let report = Scanner::default().report(&markets, days, Utc::now());
            println!("{}", report);
        }

        Commands::Estimate { slug, strategy } => {
            let strategy: StrategyKind = strategy.parse()?;
            let client = GammaClient::with_base_url(app.gamma_url.clone())?;
            let market = client
                .market_by_slug(&slug)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Market not found: {}", slug))?;

            let history_path = PaperConfig::default().history_path;
            let history = if history_path.exists() {
                PriceHistory::load(&history_path)?
            } else {
                PriceHistory::default()
            };

            let ctx = PredictionContext::new(&history, market.yes_price)
                .with_category(&market.category)
                .with_question(&market.question);
            let estimator = EdgeEstimator::default();

            match strategy {
                StrategyKind::Ensemble => println!("{}", estimator.estimate(&market.slug, &ctx)),
                kind => {
                    let est = estimator.estimate_with(kind, &market.slug, &ctx);
                    println!("\n{:=^60}", format!(" {} ESTIMATE ", kind.name().to_uppercase()));
                    println!("Market:        {}", market.question);
                    println!("Current Price: {:.2}%", market.yes_price * 100.0);
                    println!("Probability:   {:.2}%", est.probability * 100.0);
                    println!("Edge:          {:+.2}%", (est.probability - market.yes_price) * 100.0);
                    println!("Confidence:    {:.0}%", est.confidence * 100.0);
                    println!("{:=^60}", "");
                }
            }
            if let Some(days) = market.days_to_resolution(Utc::now()) {
                println!("Resolves in {:.1} days", days);
            }
        }

        Commands::Backtest {
            data,
            strategy,
            compare,
            bankroll,
            min_edge,
            exits,
            output,
        } => {
            let points = load_history(&data)?;
            info!(points = points.len(), file = %data.display(), "Loaded historical data");

            let config = BacktestConfig {
                initial_bankroll: match bankroll {
                    Some(b) => Decimal::try_from(b)?,
                    None => app.bankroll,
                },
                min_edge,
                use_exits: exits,
                sizing: app.sizing.clone(),
                targets: app.targets.clone(),
            };
            let backtester = Backtester::new(config);

            if compare {
                let comparison = backtester.compare_strategies(&points, &StrategyKind::ALL);
                println!("{}", comparison);
                if let (Some(path), Some(best)) = (output, comparison.0.first()) {
                    best.save_json(&path)?;
                    println!("Best result saved to {}", path.display());
                }
            } else {
                let results = backtester.run(&points, strategy.parse()?);
                println!("{}", results);
                if let Some(path) = output {
                    results.save_json(&path)?;
                    println!("Results saved to {}", path.display());
                }
            }
        }

        Commands::Paper { action } => {
            let db = open_db(&cli.database).await?;
            let client = GammaClient::with_base_url(app.gamma_url.clone())?;

            let mut config = PaperConfig {
                initial_bankroll: app.bankroll,
                sizing: app.sizing.clone(),
                targets: app.targets.clone(),
                ..Default::default()
            };
            if let PaperCommand::Run { strategy, max_days, .. }
            | PaperCommand::Cycle { strategy, max_days } = &action
            {
                config.strategy = strategy.parse()?;
                config.scanner = ScannerConfig {
                    max_days_to_resolution: *max_days,
                    ..Default::default()
                };
            }

            match action {
                PaperCommand::Run { interval, .. } => {
                    let secs = interval.unwrap_or(config.interval_secs).max(1);
                    let mut trader = PaperTrader::new(config, db, client).await?;

                    println!("\n{:=^60}", " PAPER TRADING ");
                    println!("Interval: {}s", secs);
                    println!("\nPress Ctrl+C to stop.\n");

                    let stop = trader.stop_handle();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            info!("Shutdown signal received");
                            stop.stop();
                        }
                    });

                    trader.run(Duration::from_secs(secs)).await?;
                    println!("{}", trader.stats().await?);
                }

                PaperCommand::Cycle { .. } => {
                    let mut trader = PaperTrader::new(config, db, client).await?;
                    let summary = trader.run_cycle().await?;
                    println!(
                        "Scanned {} markets, {} tradeable, {} signals, opened {} positions",
                        summary.markets_scanned, summary.tradeable, summary.candidates, summary.opened
                    );
                }

                PaperCommand::Monitor => {
                    let mut trader = PaperTrader::new(config, db, client).await?;
                    let closed = trader.monitor_exits().await?;
                    if closed.is_empty() {
                        println!("No exits triggered.");
                    }
                    for (trade, signal) in closed {
                        println!(
                            "{:<40} {:<11} exit {:.3} (YES {:.3})  P&L ${:+.2}",
                            truncate(&trade.market_slug, 40),
                            signal.reason.as_str(),
                            signal.exit_price,
                            signal.exit_yes_price,
                            signal.pnl
                        );
                    }
                }

                PaperCommand::Resolve { slug, outcome } => {
                    let mut trader = PaperTrader::new(config, db, client).await?;
                    let closed = trader.resolve(&slug, outcome).await?;
                    println!(
                        "Resolved {} as {}: closed {} trades",
                        slug,
                        if outcome == 1 { "YES" } else { "NO" },
                        closed.len()
                    );
                    for trade in closed {
                        println!(
                            "  {} {} @ {:.3} -> P&L ${:+.2}",
                            trade.side,
                            truncate(&trade.market_slug, 40),
                            trade.entry_price,
                            trade.pnl_decimal().unwrap_or(Decimal::ZERO)
                        );
                    }
                }

                PaperCommand::Status => {
                    let trader = PaperTrader::new(config, db, client).await?;
                    println!("{}", trader.stats().await?);
                }

                PaperCommand::Delete { id } => {
                    let trade = db
                        .get_trade(&id)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Trade {} not found", id))?;
                    db.delete_trade(&id).await?;

                    let status = if trade.is_open() {
                        "open".to_string()
                    } else {
                        trade
                            .exit_reason()
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "closed".to_string())
                    };
                    println!("Deleted {} trade {} on {}", status, id, trade.market_slug);
                }
            }
        }

        Commands::Calibration => {
            let db = open_db(&cli.database).await?;
            let tracker = PredictionTracker::new(db.load_predictions().await?);
            println!("{}", tracker.calibration_report());
        }

        Commands::Alert { action } => {
            let db = open_db(&cli.database).await?;
            let client = GammaClient::with_base_url(app.gamma_url.clone())?;

            match action {
                AlertCommand::Add {
                    slug,
                    condition,
                    threshold,
                } => {
                    let condition: AlertCondition = condition.parse()?;
                    let market = client
                        .market_by_slug(&slug)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Market not found: {}", slug))?;
                    let id = db
                        .add_alert(&slug, &market.question, condition, threshold)
                        .await?;
                    println!(
                        "Alert #{} added: {} {} {} (current YES {:.3})",
                        id, slug, condition, threshold, market.yes_price
                    );
                }

                AlertCommand::List => {
                    let alerts = db.list_alerts().await?;
                    if alerts.is_empty() {
                        println!("No alerts. Use 'polyedge alert add <slug> <condition> <threshold>'.");
                        return Ok(());
                    }
                    println!(
                        "\n{:>4} {:<40} {:<11} {:>9} {:>6} {:>10}",
                        "ID", "MARKET", "CONDITION", "THRESHOLD", "SENT", "CREATED"
                    );
                    println!("{}", "-".repeat(85));
                    for a in alerts {
                        println!(
                            "{:>4} {:<40} {:<11} {:>9.3} {:>6} {:>10}",
                            a.id,
                            truncate(&a.market_slug, 40),
                            a.condition,
                            a.threshold,
                            if a.notification_sent { "yes" } else { "no" },
                            a.created_at.format("%Y-%m-%d")
                        );
                    }
                }

                AlertCommand::Check => {
                    let mut monitor = AlertMonitor::new(db, client);
                    let fired = monitor.check().await?;
                    if fired.is_empty() {
                        println!("No alerts triggered.");
                    }
                    for alert in fired {
                        println!("{}", alert);
                    }
                }

                AlertCommand::Reset { id } => {
                    if !db.reset_alert(id).await? {
                        bail!("Alert #{} not found", id);
                    }
                    println!("Alert #{} re-armed", id);
                }

                AlertCommand::Remove { id } => {
                    if !db.remove_alert(id).await? {
                        bail!("Alert #{} not found", id);
                    }
                    println!("Alert #{} removed", id);
                }
            }
        }
    }

    Ok(())
}

async fn open_db(url: &str) -> Result<Database> {
    Database::new(url)
        .await
        .with_context(|| format!("Failed to open database {}", url))
}

fn print_sizing(bankroll: Decimal, price: f64, prob: f64, result: &SizingResult) {
    println!("\n{:=^60}", " POSITION SIZING ");
    println!("Bankroll:           ${:.2}", bankroll);
    println!("YES Price:          {:.3}", price);
    println!("Estimate:           {:.1}%", prob * 100.0);
    println!("Side:               {} @ {:.3}", result.side, result.traded_price);
    println!("Edge:               {:+.2}%", result.edge * 100.0);
    println!("{}", "-".repeat(60));
    println!("Raw Kelly:          {:.2}%", result.raw_kelly * 100.0);
    println!("Confidence Factor:  {:.2}", result.confidence_factor);
    println!("Correlation Factor: {:.2}", result.correlation_factor);
    println!("Drawdown Factor:    {:.2}", result.drawdown_factor);
    println!("Adjusted Fraction:  {:.2}%", result.adjusted_fraction * 100.0);
    println!("{}", "-".repeat(60));

    match &result.no_trade {
        Some(reason) => println!("Decision:           NO TRADE ({})", reason),
        None => {
            println!(
                "Position Size:      ${:.2} ({:.1}% of bankroll)",
                result.position_size,
                if bankroll > Decimal::ZERO {
                    result.position_size / bankroll * dec!(100)
                } else {
                    Decimal::ZERO
                }
            );
            println!("Shares:             {:.2}", result.shares);
        }
    }
    println!("Rationale:          {}", result.rationale);
    for rec in &result.recommendations {
        println!("  * {}", rec);
    }
    println!("{:=^60}", "");
}

/// Estimate given directly or implied by bookmaker odds on YES.
fn estimate_from(
    prob: Option<f64>,
    decimal_odds: Option<f64>,
    american_odds: Option<i32>,
) -> Result<f64> {
    if let Some(prob) = prob {
        return Ok(prob);
    }
    if let Some(odds) = decimal_odds {
        return implied_probability_from_decimal(odds)
            .with_context(|| format!("Decimal odds must be positive, got {}", odds));
    }
    if let Some(odds) = american_odds {
        return implied_probability_from_american(odds).context("American odds cannot be 0");
    }
    bail!("Provide --prob, --decimal-odds or --american-odds")
}

/// Which exit a YES quote would trigger.
fn exit_status(levels: &TargetLevels, yes_price: f64) -> &'static str {
    if levels.take_profit_hit_yes(yes_price) {
        "TAKE PROFIT"
    } else if levels.stop_loss_hit_yes(yes_price) {
        "STOP LOSS"
    } else {
        "HOLD"
    }
}

fn print_targets(result: &TargetResult, current_yes: Option<f64>) {
    println!("\n{:=^60}", " EXIT TARGETS ");
    if let Some(levels) = result.levels() {
        println!("Side:          {}", levels.side);
        println!("Entry:         {:.4}", levels.entry_price);
        println!("Initial Edge:  {:+.2}%", levels.initial_edge * 100.0);
        println!(
            "Take Profit:   {:.4} (+{:.1}%, YES {:.4}){}",
            levels.target_price,
            levels.tp_pct * 100.0,
            levels.target_yes_price,
            if levels.reachable { "" } else { "  UNREACHABLE" }
        );
        println!(
            "Stop Loss:     {:.4} (-{:.1}%, YES {:.4}){}",
            levels.stop_price,
            levels.sl_pct * 100.0,
            levels.stop_yes_price,
            if levels.stop_reachable { "" } else { "  UNREACHABLE" }
        );
        println!("Edge Captured: {:.4}", levels.captured_edge);
        if let Some(yes) = current_yes {
            println!("At YES {:.4}:  {}", yes, exit_status(levels, yes));
        }
    }
    if let Some(reason) = result.hold_reason() {
        println!("Hold to resolution: {}", reason);
    }
    println!("{:=^60}", "");
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_from_odds() {
        assert_eq!(estimate_from(Some(0.55), None, None).unwrap(), 0.55);
        assert!((estimate_from(None, Some(2.5), None).unwrap() - 0.4).abs() < 1e-12);
        assert!((estimate_from(None, None, Some(150)).unwrap() - 0.4).abs() < 1e-12);
        assert!((estimate_from(None, None, Some(-200)).unwrap() - 2.0 / 3.0).abs() < 1e-12);

        assert!(estimate_from(None, Some(0.0), None).is_err());
        assert!(estimate_from(None, None, Some(0)).is_err());
        assert!(estimate_from(None, None, None).is_err());
    }

    #[test]
    fn test_exit_status_for_no_position() {
        // NO bought at 0.35 while YES traded at 0.65
        let result = TargetCalculator::default().targets(0.35, Side::No, 0.15);
        let levels = result.levels().unwrap();

        assert_eq!(exit_status(levels, 0.53), "TAKE PROFIT");
        assert_eq!(exit_status(levels, 0.60), "HOLD");
        assert_eq!(exit_status(levels, 0.83), "STOP LOSS");
        assert!(result.hold_reason().is_none());
    }

    #[test]
    fn test_cli_parses_odds_and_delete() {
        let cli = Cli::try_parse_from(["polyedge", "ev", "--price", "0.35", "--american-odds", "-200"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ev { prob: None, american_odds: Some(-200), .. }
        ));

        assert!(Cli::try_parse_from(["polyedge", "ev", "--price", "0.35"]).is_err());
        assert!(Cli::try_parse_from([
            "polyedge", "ev", "--price", "0.35", "--prob", "0.5", "--decimal-odds", "2.0"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["polyedge", "paper", "delete", "abc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Paper { action: PaperCommand::Delete { ref id } } if id == "abc"
        ));
    }
}
