//! SQLite persistence for paper trading.
//!
//! Stores everything needed to resume after restart:
//! - Paper trades, open and closed, with their TP/SL levels
//! - Logged predictions for calibration
//! - Price alerts
//! - Equity curve for P&L tracking

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::alerts::AlertCondition;
use crate::estimation::PredictionRecord;
use crate::metrics::{max_drawdown, Drawdown};
use crate::models::{Market, Side};
use crate::trading::{ExitMonitor, ExitReason, MonitoredPosition};

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Paper trade record. Prices are in traded-token space unless named `_yes_`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PaperTrade {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub market_slug: String,
    pub market_question: String,
    pub category: String,
    pub side: String,
    pub entry_price: f64,
    pub entry_yes_price: f64,
    pub size: f64,
    pub shares: f64,
    pub edge: f64,
    pub confidence: f64,
    pub strategy: String,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub status: String,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<String>,
    pub exit_timestamp: Option<DateTime<Utc>>,
    pub outcome: Option<i64>,
    pub pnl: Option<f64>,
    pub holding_days: Option<i64>,
    pub notes: Option<String>,
}

impl PaperTrade {
    /// A new open trade on `market`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        market: &Market,
        side: Side,
        entry_price: f64,
        size: Decimal,
        shares: Decimal,
        edge: f64,
        confidence: f64,
        strategy: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            market_slug: market.slug.clone(),
            market_question: market.question.clone(),
            category: market.category.clone(),
            side: side.as_str().to_string(),
            entry_price,
            entry_yes_price: side.to_yes_space(entry_price),
            size: size.to_f64().unwrap_or(0.0),
            shares: shares.to_f64().unwrap_or(0.0),
            edge,
            confidence,
            strategy: strategy.to_string(),
            tp_price: None,
            sl_price: None,
            status: "open".to_string(),
            exit_price: None,
            exit_reason: None,
            exit_timestamp: None,
            outcome: None,
            pnl: None,
            holding_days: None,
            notes: None,
        }
    }

    pub fn with_levels(mut self, tp_price: Option<f64>, sl_price: Option<f64>) -> Self {
        self.tp_price = tp_price;
        self.sl_price = sl_price;
        self
    }

    pub fn side(&self) -> Result<Side> {
        Side::from_str(&self.side)
    }

    pub fn is_open(&self) -> bool {
        self.status == "open"
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn size_decimal(&self) -> Decimal {
        to_money(self.size)
    }

    pub fn pnl_decimal(&self) -> Option<Decimal> {
        self.pnl.map(to_money)
    }

    /// View for exit monitoring.
    pub fn monitored(&self) -> Result<MonitoredPosition> {
        Ok(MonitoredPosition {
            market_slug: self.market_slug.clone(),
            side: self.side()?,
            entry_price: self.entry_price,
            shares: Decimal::try_from(self.shares)
                .context("Invalid share count")?
                .round_dp(4),
            tp_price: self.tp_price,
            sl_price: self.sl_price,
            opened_at: self.timestamp,
        })
    }
}

/// Aggregate over closed paper trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub total_trades: i64,
    pub open_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub avg_pnl: Decimal,
    pub avg_edge: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PredictionRow {
    id: i64,
    timestamp: DateTime<Utc>,
    market_slug: String,
    question: String,
    predicted_prob: f64,
    market_price: f64,
    edge: f64,
    side: String,
    position_size: f64,
    strategy: String,
    resolved: bool,
    actual_outcome: Option<i64>,
    pnl: Option<f64>,
    brier_score: Option<f64>,
    model_predictions: Option<String>,
}

impl PredictionRow {
    fn into_record(self) -> Result<PredictionRecord> {
        let model_predictions: BTreeMap<String, f64> = match self.model_predictions.as_deref() {
            Some(json) if !json.is_empty() => {
                serde_json::from_str(json).context("Invalid model_predictions JSON")?
            }
            _ => BTreeMap::new(),
        };
        Ok(PredictionRecord {
            id: Some(self.id),
            market_slug: self.market_slug,
            question: self.question,
            predicted_prob: self.predicted_prob,
            market_price: self.market_price,
            edge: self.edge,
            side: Side::from_str(&self.side)?,
            position_size: to_money(self.position_size),
            strategy: self.strategy,
            timestamp: self.timestamp,
            resolved: self.resolved,
            actual_outcome: self.actual_outcome.map(|o| o.clamp(0, 1) as u8),
            pnl: self.pnl.map(to_money),
            brier_score: self.brier_score,
            model_predictions,
        })
    }
}

/// Stored price alert.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredAlert {
    pub id: i64,
    pub market_slug: String,
    pub market_name: String,
    pub condition: String,
    pub threshold: f64,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredAlert {
    pub fn condition(&self) -> Result<AlertCondition> {
        AlertCondition::from_str(&self.condition)
    }
}

/// Equity curve point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EquityPoint {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub bankroll: f64,
    pub exposure: f64,
    pub realized_pnl: f64,
}

fn to_money(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO).round_dp(2)
}

fn to_real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl Database {
    /// Open (creating if needed) a database and run migrations.
    ///
    /// In-memory databases get a single connection so every query sees the same store.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL '{}'", database_url))?
            .create_if_missing(true);
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if max_connections == 1 {
            // dropping the only connection drops the in-memory database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        // Paper trades
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS paper_trades (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                market_slug TEXT NOT NULL,
                market_question TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'general',
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                entry_yes_price REAL NOT NULL,
                size REAL NOT NULL,
                shares REAL NOT NULL,
                edge REAL NOT NULL DEFAULT 0,
                confidence REAL NOT NULL DEFAULT 0,
                strategy TEXT NOT NULL DEFAULT 'ensemble',
                tp_price REAL,
                sl_price REAL,
                status TEXT NOT NULL DEFAULT 'open',
                exit_price REAL,
                exit_reason TEXT,
                exit_timestamp TEXT,
                outcome INTEGER,
                pnl REAL,
                holding_days INTEGER,
                notes TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Logged predictions
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                market_slug TEXT NOT NULL,
                question TEXT NOT NULL DEFAULT '',
                predicted_prob REAL NOT NULL,
                market_price REAL NOT NULL,
                edge REAL NOT NULL,
                side TEXT NOT NULL,
                position_size REAL NOT NULL DEFAULT 0,
                strategy TEXT NOT NULL DEFAULT 'ensemble',
                resolved INTEGER NOT NULL DEFAULT 0,
                actual_outcome INTEGER,
                pnl REAL,
                brier_score REAL,
                model_predictions TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Price alerts
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market_slug TEXT NOT NULL,
                market_name TEXT NOT NULL DEFAULT '',
                condition TEXT NOT NULL,
                threshold REAL NOT NULL,
                notification_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Equity curve
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_curve (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                bankroll REAL NOT NULL,
                exposure REAL NOT NULL DEFAULT 0,
                realized_pnl REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_paper_trades_market ON paper_trades(market_slug)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_paper_trades_status ON paper_trades(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_market ON predictions(market_slug)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_equity_curve_time ON equity_curve(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Paper Trades ====================

    /// Insert a paper trade.
    pub async fn save_trade(&self, trade: &PaperTrade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO paper_trades (
                id, timestamp, market_slug, market_question, category,
                side, entry_price, entry_yes_price, size, shares,
                edge, confidence, strategy, tp_price, sl_price,
                status, exit_price, exit_reason, exit_timestamp,
                outcome, pnl, holding_days, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.id)
        .bind(trade.timestamp)
        .bind(&trade.market_slug)
        .bind(&trade.market_question)
        .bind(&trade.category)
        .bind(&trade.side)
        .bind(trade.entry_price)
        .bind(trade.entry_yes_price)
        .bind(trade.size)
        .bind(trade.shares)
        .bind(trade.edge)
        .bind(trade.confidence)
        .bind(&trade.strategy)
        .bind(trade.tp_price)
        .bind(trade.sl_price)
        .bind(&trade.status)
        .bind(trade.exit_price)
        .bind(&trade.exit_reason)
        .bind(trade.exit_timestamp)
        .bind(trade.outcome)
        .bind(trade.pnl)
        .bind(trade.holding_days)
        .bind(&trade.notes)
        .execute(&self.pool)
        .await
        .context("Failed to save paper trade")?;

        Ok(())
    }

    /// Get a paper trade by id.
    pub async fn get_trade(&self, id: &str) -> Result<Option<PaperTrade>> {
        sqlx::query_as::<_, PaperTrade>("SELECT * FROM paper_trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch paper trade")
    }

    pub async fn open_trades(&self) -> Result<Vec<PaperTrade>> {
        sqlx::query_as::<_, PaperTrade>(
            "SELECT * FROM paper_trades WHERE status = 'open' ORDER BY timestamp",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch open trades")
    }

    pub async fn closed_trades(&self) -> Result<Vec<PaperTrade>> {
        sqlx::query_as::<_, PaperTrade>(
            "SELECT * FROM paper_trades WHERE status = 'closed' ORDER BY exit_timestamp, timestamp",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch closed trades")
    }

    pub async fn trades_by_market(&self, market_slug: &str) -> Result<Vec<PaperTrade>> {
        sqlx::query_as::<_, PaperTrade>(
            "SELECT * FROM paper_trades WHERE market_slug = ? ORDER BY timestamp",
        )
        .bind(market_slug)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch trades for market")
    }

    /// Close an open trade. Returns false if it was missing or already closed.
    pub async fn close_trade(
        &self,
        id: &str,
        exit_price: f64,
        reason: ExitReason,
        pnl: Decimal,
        holding_days: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE paper_trades SET
                status = 'closed',
                exit_price = ?,
                exit_reason = ?,
                exit_timestamp = ?,
                pnl = ?,
                holding_days = ?
            WHERE id = ? AND status = 'open'
            "#,
        )
        .bind(exit_price)
        .bind(reason.as_str())
        .bind(Utc::now())
        .bind(to_real(pnl))
        .bind(holding_days)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to close paper trade")?;

        Ok(result.rows_affected() > 0)
    }

    /// Settle every open trade on a resolved market. Returns the closed trades.
    pub async fn resolve_market(&self, market_slug: &str, outcome: u8) -> Result<Vec<PaperTrade>> {
        let monitor = ExitMonitor::default();
        let now = Utc::now();
        let mut closed = Vec::new();

        let open: Vec<PaperTrade> = self
            .trades_by_market(market_slug)
            .await?
            .into_iter()
            .filter(PaperTrade::is_open)
            .collect();

        for trade in open {
            let signal = monitor.settle(&trade.monitored()?, outcome, now);
            sqlx::query(
                r#"
                UPDATE paper_trades SET
                    status = 'closed',
                    outcome = ?,
                    exit_price = ?,
                    exit_reason = ?,
                    exit_timestamp = ?,
                    pnl = ?,
                    holding_days = ?
                WHERE id = ? AND status = 'open'
                "#,
            )
            .bind(outcome as i64)
            .bind(signal.exit_price)
            .bind(signal.reason.as_str())
            .bind(now)
            .bind(to_real(signal.pnl))
            .bind(signal.holding_days)
            .bind(&trade.id)
            .execute(&self.pool)
            .await
            .context("Failed to settle paper trade")?;

            if let Some(updated) = self.get_trade(&trade.id).await? {
                closed.push(updated);
            }
        }

        Ok(closed)
    }

    pub async fn delete_trade(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM paper_trades WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete paper trade")?;
        Ok(result.rows_affected() > 0)
    }

    /// Win rate and P&L over closed trades.
    pub async fn performance_summary(&self) -> Result<PerformanceSummary> {
        let (total, wins, losses, total_pnl, avg_pnl, avg_edge): (
            i64,
            Option<i64>,
            Option<i64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                SUM(CASE WHEN pnl > 0 THEN 1 ELSE 0 END),
                SUM(CASE WHEN pnl < 0 THEN 1 ELSE 0 END),
                SUM(pnl),
                AVG(pnl),
                AVG(edge)
            FROM paper_trades
            WHERE status = 'closed'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute performance summary")?;

        let (open,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM paper_trades WHERE status = 'open'")
                .fetch_one(&self.pool)
                .await?;

        let wins = wins.unwrap_or(0);
        Ok(PerformanceSummary {
            total_trades: total,
            open_trades: open,
            winning_trades: wins,
            losing_trades: losses.unwrap_or(0),
            win_rate: if total > 0 { wins as f64 / total as f64 } else { 0.0 },
            total_pnl: to_money(total_pnl.unwrap_or(0.0)),
            avg_pnl: to_money(avg_pnl.unwrap_or(0.0)),
            avg_edge: avg_edge.unwrap_or(0.0),
        })
    }

    /// Dollars committed to open trades.
    pub async fn current_exposure(&self) -> Result<Decimal> {
        let (exposure,): (Option<f64>,) =
            sqlx::query_as("SELECT SUM(size) FROM paper_trades WHERE status = 'open'")
                .fetch_one(&self.pool)
                .await
                .context("Failed to compute exposure")?;
        Ok(to_money(exposure.unwrap_or(0.0)))
    }

    // ==================== Predictions ====================

    /// Insert a prediction and return its row id.
    pub async fn save_prediction(&self, record: &PredictionRecord) -> Result<i64> {
        let models = serde_json::to_string(&record.model_predictions)
            .context("Failed to encode model predictions")?;

        let result = sqlx::query(
            r#"
            INSERT INTO predictions (
                timestamp, market_slug, question, predicted_prob, market_price,
                edge, side, position_size, strategy, resolved,
                actual_outcome, pnl, brier_score, model_predictions
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp)
        .bind(&record.market_slug)
        .bind(&record.question)
        .bind(record.predicted_prob)
        .bind(record.market_price)
        .bind(record.edge)
        .bind(record.side.as_str())
        .bind(to_real(record.position_size))
        .bind(&record.strategy)
        .bind(record.resolved)
        .bind(record.actual_outcome.map(i64::from))
        .bind(record.pnl.map(to_real))
        .bind(record.brier_score)
        .bind(models)
        .execute(&self.pool)
        .await
        .context("Failed to save prediction")?;

        Ok(result.last_insert_rowid())
    }

    /// All predictions, oldest first.
    pub async fn load_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>("SELECT * FROM predictions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load predictions")?;
        rows.into_iter().map(PredictionRow::into_record).collect()
    }

    /// Persist the resolution fields of a record that has a row id.
    pub async fn resolve_prediction(&self, record: &PredictionRecord) -> Result<bool> {
        let Some(id) = record.id else {
            return Ok(false);
        };
        let result = sqlx::query(
            r#"
            UPDATE predictions SET
                resolved = ?,
                actual_outcome = ?,
                pnl = ?,
                brier_score = ?
            WHERE id = ?
            "#,
        )
        .bind(record.resolved)
        .bind(record.actual_outcome.map(i64::from))
        .bind(record.pnl.map(to_real))
        .bind(record.brier_score)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to resolve prediction")?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Alerts ====================

    pub async fn add_alert(
        &self,
        market_slug: &str,
        market_name: &str,
        condition: AlertCondition,
        threshold: f64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (market_slug, market_name, condition, threshold, notification_sent, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(market_slug)
        .bind(market_name)
        .bind(condition.as_str())
        .bind(threshold)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to add alert")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_alerts(&self) -> Result<Vec<StoredAlert>> {
        sqlx::query_as::<_, StoredAlert>("SELECT * FROM alerts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list alerts")
    }

    pub async fn mark_alert_sent(&self, id: i64) -> Result<bool> {
        self.set_alert_sent(id, true).await
    }

    /// Re-arm a triggered alert.
    pub async fn reset_alert(&self, id: i64) -> Result<bool> {
        self.set_alert_sent(id, false).await
    }

    async fn set_alert_sent(&self, id: i64, sent: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET notification_sent = ? WHERE id = ?")
            .bind(sent)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update alert")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_alert(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to remove alert")?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Equity Curve ====================

    /// Record an equity curve point.
    pub async fn record_equity(
        &self,
        bankroll: Decimal,
        exposure: Decimal,
        realized_pnl: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO equity_curve (timestamp, bankroll, exposure, realized_pnl)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Utc::now())
        .bind(to_real(bankroll))
        .bind(to_real(exposure))
        .bind(to_real(realized_pnl))
        .execute(&self.pool)
        .await
        .context("Failed to record equity")?;

        Ok(())
    }

    /// Every recorded equity point, oldest first.
    pub async fn equity_curve(&self) -> Result<Vec<EquityPoint>> {
        sqlx::query_as::<_, EquityPoint>("SELECT * FROM equity_curve ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch equity curve")
    }

    /// Highest bankroll ever recorded. `None` before the first point.
    pub async fn peak_equity(&self) -> Result<Option<Decimal>> {
        let (peak,): (Option<f64>,) = sqlx::query_as("SELECT MAX(bankroll) FROM equity_curve")
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch peak equity")?;
        Ok(peak.map(to_money))
    }

    /// Max drawdown over the recorded equity curve.
    pub async fn calculate_max_drawdown(&self) -> Result<Drawdown> {
        let points = self.equity_curve().await?;
        let curve: Vec<Decimal> = points.iter().map(|p| to_money(p.bankroll)).collect();
        let Some(first) = curve.first().copied() else {
            return Ok(Drawdown::default());
        };
        Ok(max_drawdown(first, &curve))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn memory_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn yes_trade(slug: &str) -> PaperTrade {
        let market = Market::new(slug, "Will it happen?", 0.40);
        PaperTrade::open(&market, Side::Yes, 0.40, dec!(100), dec!(250), 0.15, 0.7, "ensemble")
            .with_levels(Some(0.6), Some(0.2))
    }

    #[tokio::test]
    async fn test_save_and_fetch_trade() {
        let db = memory_db().await;
        let trade = yes_trade("m1");
        db.save_trade(&trade).await.unwrap();

        let loaded = db.get_trade(&trade.id).await.unwrap().unwrap();
        assert_eq!(loaded.market_slug, "m1");
        assert_eq!(loaded.side().unwrap(), Side::Yes);
        assert_eq!(loaded.tp_price, Some(0.6));
        assert!(loaded.is_open());

        assert_eq!(db.open_trades().await.unwrap().len(), 1);
        assert!(db.closed_trades().await.unwrap().is_empty());
        assert_eq!(db.current_exposure().await.unwrap(), dec!(100));
        assert!(db.get_trade("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_trade_once() {
        let db = memory_db().await;
        let trade = yes_trade("m1");
        db.save_trade(&trade).await.unwrap();

        assert!(db
            .close_trade(&trade.id, 0.6, ExitReason::TakeProfit, dec!(50), 2)
            .await
            .unwrap());
        assert!(!db
            .close_trade(&trade.id, 0.2, ExitReason::StopLoss, dec!(-50), 3)
            .await
            .unwrap());

        let closed = db.get_trade(&trade.id).await.unwrap().unwrap();
        assert_eq!(closed.exit_reason(), Some(ExitReason::TakeProfit));
        assert_eq!(closed.pnl_decimal(), Some(dec!(50)));
        assert_eq!(closed.holding_days, Some(2));
        assert_eq!(db.current_exposure().await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_resolve_market_settles_all_open() {
        let db = memory_db().await;
        let a = yes_trade("election");
        let market = Market::new("election", "Will it happen?", 0.40);
        let b = PaperTrade::open(&market, Side::No, 0.60, dec!(60), dec!(100), 0.1, 0.6, "trend");
        let other = yes_trade("other");
        for t in [&a, &b, &other] {
            db.save_trade(t).await.unwrap();
        }

        let closed = db.resolve_market("election", 1).await.unwrap();
        assert_eq!(closed.len(), 2);

        let a = db.get_trade(&a.id).await.unwrap().unwrap();
        assert_eq!(a.outcome, Some(1));
        assert_eq!(a.pnl_decimal(), Some(dec!(150)));
        assert_eq!(a.exit_reason(), Some(ExitReason::Resolved));

        let b = db.get_trade(&b.id).await.unwrap().unwrap();
        assert_eq!(b.pnl_decimal(), Some(dec!(-60)));

        let summary = db.performance_summary().await.unwrap();
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.open_trades, 1);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
        assert_eq!(summary.total_pnl, dec!(90));
        assert!((summary.win_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_delete_trade() {
        let db = memory_db().await;
        let trade = yes_trade("m1");
        db.save_trade(&trade).await.unwrap();
        assert!(db.delete_trade(&trade.id).await.unwrap());
        assert!(!db.delete_trade(&trade.id).await.unwrap());
        assert!(db.trades_by_market("m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prediction_round_trip() {
        let db = memory_db().await;
        let mut models = BTreeMap::new();
        models.insert("trend".to_string(), 0.55);
        let mut record = PredictionRecord::new("m1", "Q?", 0.6, 0.5, Side::Yes, dec!(100))
            .with_models(models);

        let id = db.save_prediction(&record).await.unwrap();
        record.id = Some(id);
        record.resolve(1);
        assert!(db.resolve_prediction(&record).await.unwrap());

        let loaded = db.load_predictions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, Some(id));
        assert!(loaded[0].resolved);
        assert_eq!(loaded[0].actual_outcome, Some(1));
        assert_eq!(loaded[0].pnl, Some(dec!(100)));
        assert_eq!(loaded[0].model_predictions.get("trend"), Some(&0.55));
    }

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let db = memory_db().await;
        let id = db
            .add_alert("m1", "Market one", AlertCondition::Above, 0.7)
            .await
            .unwrap();

        let alerts = db.list_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].condition().unwrap(), AlertCondition::Above);
        assert!(!alerts[0].notification_sent);

        assert!(db.mark_alert_sent(id).await.unwrap());
        assert!(db.list_alerts().await.unwrap()[0].notification_sent);
        assert!(db.reset_alert(id).await.unwrap());
        assert!(!db.list_alerts().await.unwrap()[0].notification_sent);

        assert!(db.remove_alert(id).await.unwrap());
        assert!(!db.remove_alert(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_equity_drawdown() {
        let db = memory_db().await;
        assert_eq!(db.calculate_max_drawdown().await.unwrap(), Drawdown::default());

        for bankroll in [dec!(1000), dec!(1200), dec!(900), dec!(1100)] {
            db.record_equity(bankroll, Decimal::ZERO, bankroll - dec!(1000))
                .await
                .unwrap();
        }

        let curve = db.equity_curve().await.unwrap();
        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0].bankroll, 1000.0);
        assert_eq!(db.peak_equity().await.unwrap(), Some(dec!(1200)));

        let dd = db.calculate_max_drawdown().await.unwrap();
        assert_eq!(dd.amount, dec!(300));
        assert!((dd.pct - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_peak_equity_spans_whole_curve() {
        let db = memory_db().await;
        assert_eq!(db.peak_equity().await.unwrap(), None);

        // Early peak followed by a long tail of lower points
        db.record_equity(dec!(15000), Decimal::ZERO, dec!(5000)).await.unwrap();
        for _ in 0..1200 {
            db.record_equity(dec!(9000), Decimal::ZERO, dec!(-1000)).await.unwrap();
        }

        assert_eq!(db.peak_equity().await.unwrap(), Some(dec!(15000)));
        assert_eq!(db.equity_curve().await.unwrap().len(), 1201);

        let dd = db.calculate_max_drawdown().await.unwrap();
        assert_eq!(dd.amount, dec!(6000));
        assert!((dd.pct - 0.4).abs() < 1e-9);
    }
}
