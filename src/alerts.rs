//! Price alerts on YES quotes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::GammaClient;
use crate::db::{Database, StoredAlert};

/// When an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCondition {
    /// YES price at or above the threshold
    Above,
    /// YES price at or below the threshold
    Below,
    /// YES price moved at least `threshold` percent since the last check
    ChangesBy,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
            AlertCondition::ChangesBy => "changes_by",
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCondition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "above" => Ok(AlertCondition::Above),
            "below" => Ok(AlertCondition::Below),
            "changes_by" | "change" => Ok(AlertCondition::ChangesBy),
            other => anyhow::bail!(
                "Unknown alert condition '{}' (expected above, below or changes_by)",
                other
            ),
        }
    }
}

/// Check one condition. `last_price` is the quote seen on the previous check.
pub fn evaluate(
    condition: AlertCondition,
    threshold: f64,
    current: f64,
    last_price: Option<f64>,
) -> Option<String> {
    match condition {
        AlertCondition::Above if current >= threshold => Some(format!(
            "Price ABOVE ${:.2} (Current: ${:.2})",
            threshold, current
        )),
        AlertCondition::Below if current <= threshold => Some(format!(
            "Price BELOW ${:.2} (Current: ${:.2})",
            threshold, current
        )),
        AlertCondition::ChangesBy => {
            let last = last_price.filter(|p| *p > 0.0)?;
            let change_pct = ((current - last) / last).abs() * 100.0;
            if change_pct < threshold {
                return None;
            }
            let direction = if current > last { "UP" } else { "DOWN" };
            Some(format!(
                "Price moved {} by {:.1}% (Current: ${:.2})",
                direction, change_pct, current
            ))
        }
        _ => None,
    }
}

/// Fired alert.
#[derive(Debug, Clone)]
pub struct TriggeredAlert {
    pub alert_id: i64,
    pub market_slug: String,
    pub market_name: String,
    pub current_price: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TriggeredAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] #{} {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.alert_id,
            self.market_name,
            self.message
        )
    }
}

/// Checks stored alerts against live quotes.
pub struct AlertMonitor {
    db: Database,
    client: GammaClient,
    last_prices: HashMap<String, f64>,
}

impl AlertMonitor {
    pub fn new(db: Database, client: GammaClient) -> Self {
        Self {
            db,
            client,
            last_prices: HashMap::new(),
        }
    }

    /// Evaluate unsent alerts, mark fired ones sent and remember the quotes.
    pub async fn check(&mut self) -> Result<Vec<TriggeredAlert>> {
        let alerts = self.db.list_alerts().await?;
        let mut slugs: Vec<String> = alerts.iter().map(|a| a.market_slug.clone()).collect();
        slugs.sort();
        slugs.dedup();

        let prices: HashMap<String, f64> = self
            .client
            .prices_for(&slugs)
            .await
            .into_iter()
            .filter_map(|(slug, price)| price.filter(|p| *p > 0.0).map(|p| (slug, p)))
            .collect();

        let now = Utc::now();
        let mut triggered = Vec::new();
        for alert in alerts.iter().filter(|a| !a.notification_sent) {
            if let Some(fired) = self.evaluate_stored(alert, &prices, now) {
                self.db.mark_alert_sent(alert.id).await?;
                info!(alert = alert.id, market = %alert.market_slug, "{}", fired.message);
                triggered.push(fired);
            }
        }

        self.last_prices.extend(prices);
        Ok(triggered)
    }

    fn evaluate_stored(
        &self,
        alert: &StoredAlert,
        prices: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Option<TriggeredAlert> {
        let current = *prices.get(&alert.market_slug)?;
        let condition = match alert.condition() {
            Ok(c) => c,
            Err(e) => {
                warn!(alert = alert.id, error = %e, "Skipping alert");
                return None;
            }
        };
        let last = self.last_prices.get(&alert.market_slug).copied();
        let message = evaluate(condition, alert.threshold, current, last)?;

        Some(TriggeredAlert {
            alert_id: alert.id,
            market_slug: alert.market_slug.clone(),
            market_name: alert.market_name.clone(),
            current_price: current,
            message,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_above_below() {
        assert_eq!(
            evaluate(AlertCondition::Above, 0.60, 0.65, None).as_deref(),
            Some("Price ABOVE $0.60 (Current: $0.65)")
        );
        assert!(evaluate(AlertCondition::Above, 0.60, 0.55, None).is_none());
        assert_eq!(
            evaluate(AlertCondition::Below, 0.30, 0.30, None).as_deref(),
            Some("Price BELOW $0.30 (Current: $0.30)")
        );
        assert!(evaluate(AlertCondition::Below, 0.30, 0.31, None).is_none());
    }

    #[test]
    fn test_changes_by_needs_previous_quote() {
        assert!(evaluate(AlertCondition::ChangesBy, 10.0, 0.5, None).is_none());
        assert!(evaluate(AlertCondition::ChangesBy, 10.0, 0.52, Some(0.50)).is_none());
        assert_eq!(
            evaluate(AlertCondition::ChangesBy, 10.0, 0.40, Some(0.50)).as_deref(),
            Some("Price moved DOWN by 20.0% (Current: $0.40)")
        );
        assert!(evaluate(AlertCondition::ChangesBy, 10.0, 0.60, Some(0.50))
            .unwrap()
            .contains("UP"));
    }

    #[test]
    fn test_condition_parse() {
        assert_eq!("above".parse::<AlertCondition>().unwrap(), AlertCondition::Above);
        assert_eq!("changes-by".parse::<AlertCondition>().unwrap(), AlertCondition::ChangesBy);
        assert!("sideways".parse::<AlertCondition>().is_err());
    }
}
