//! Response types for the Polymarket Gamma API.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::Market;

/// Market entry from `/markets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub condition_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub slug: String,

    /// JSON-encoded outcome labels, e.g. `"[\"Yes\",\"No\"]"`
    #[serde(default)]
    pub outcomes: Option<String>,

    /// JSON-encoded prices, either `"[\"0.4\",\"0.6\"]"` or `"{\"Yes\":0.4,\"No\":0.6}"`
    #[serde(default)]
    pub outcome_prices: Option<String>,

    #[serde(default, deserialize_with = "flexible_decimal")]
    pub volume: Decimal,
    #[serde(default, deserialize_with = "flexible_decimal")]
    pub liquidity: Decimal,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

impl GammaMarket {
    /// Convert into the domain model. Fails when prices are missing or malformed.
    pub fn into_market(self) -> Result<Market> {
        let raw = self
            .outcome_prices
            .as_deref()
            .with_context(|| format!("market '{}' has no outcomePrices", self.slug))?;
        let (yes_price, no_price) = parse_outcome_prices(raw, self.outcomes.as_deref())
            .with_context(|| format!("market '{}' has malformed outcomePrices", self.slug))?;

        let category = self
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "general".to_string());

        let description: String = self
            .description
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();

        Ok(Market {
            condition_id: self.condition_id,
            question: self.question,
            slug: self.slug,
            yes_price,
            no_price,
            volume: self.volume,
            liquidity: self.liquidity,
            end_date: self.end_date.as_deref().and_then(parse_end_date),
            category,
            description,
        })
    }
}

/// Parse `outcomePrices` into `(yes, no)`.
///
/// Arrays follow the order of `outcomes` when it names a "Yes" entry,
/// otherwise YES is assumed first.
pub fn parse_outcome_prices(raw: &str, outcomes: Option<&str>) -> Result<(f64, f64)> {
    let value: Value = serde_json::from_str(raw).context("outcomePrices is not JSON")?;

    let (yes, no) = match value {
        Value::Array(items) => {
            anyhow::ensure!(items.len() >= 2, "expected two outcome prices, got {}", items.len());
            let yes_idx = outcomes
                .and_then(|o| serde_json::from_str::<Vec<String>>(o).ok())
                .and_then(|labels| labels.iter().position(|l| l.eq_ignore_ascii_case("yes")))
                .filter(|idx| *idx < 2)
                .unwrap_or(0);
            let no_idx = 1 - yes_idx;
            (price_value(&items[yes_idx])?, price_value(&items[no_idx])?)
        }
        Value::Object(map) => {
            let lookup = |key: &str| {
                map.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
                    .with_context(|| format!("outcomePrices has no '{}' entry", key))
                    .and_then(price_value)
            };
            (lookup("yes")?, lookup("no")?)
        }
        other => anyhow::bail!("unexpected outcomePrices shape: {}", other),
    };

    for p in [yes, no] {
        anyhow::ensure!(p.is_finite() && (0.0..=1.0).contains(&p), "price {} out of range", p);
    }
    Ok((yes, no))
}

fn price_value(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().context("price is not a float"),
        Value::String(s) => s.trim().parse::<f64>().context("price string is not a number"),
        other => anyhow::bail!("unexpected price value: {}", other),
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Gamma reports volume and liquidity as numbers or numeric strings.
fn flexible_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .unwrap_or(Decimal::ZERO),
        Some(Value::String(s)) => s.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_array_prices() {
        let (yes, no) = parse_outcome_prices(r#"["0.42", "0.58"]"#, None).unwrap();
        assert!((yes - 0.42).abs() < 1e-12);
        assert!((no - 0.58).abs() < 1e-12);
    }

    #[test]
    fn test_parse_array_follows_outcome_order() {
        let (yes, no) =
            parse_outcome_prices(r#"["0.7", "0.3"]"#, Some(r#"["No", "Yes"]"#)).unwrap();
        assert!((yes - 0.3).abs() < 1e-12);
        assert!((no - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_parse_object_prices() {
        let (yes, no) = parse_outcome_prices(r#"{"Yes": 0.25, "No": "0.75"}"#, None).unwrap();
        assert!((yes - 0.25).abs() < 1e-12);
        assert!((no - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_prices_rejected() {
        assert!(parse_outcome_prices("not json", None).is_err());
        assert!(parse_outcome_prices(r#"["0.5"]"#, None).is_err());
        assert!(parse_outcome_prices(r#"["1.5", "0.5"]"#, None).is_err());
        assert!(parse_outcome_prices(r#"{"Maybe": 0.5}"#, None).is_err());
    }

    #[test]
    fn test_gamma_market_into_market() {
        let json = r#"{
            "conditionId": "0xabc",
            "question": "Will it rain?",
            "slug": "will-it-rain",
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.35\", \"0.65\"]",
            "volume": "125000.5",
            "liquidity": 60000,
            "endDate": "2025-01-31T12:00:00Z",
            "category": "Weather"
        }"#;
        let gamma: GammaMarket = serde_json::from_str(json).unwrap();
        let market = gamma.into_market().unwrap();

        assert_eq!(market.slug, "will-it-rain");
        assert!((market.yes_price - 0.35).abs() < 1e-12);
        assert_eq!(market.volume, dec!(125000.5));
        assert_eq!(market.liquidity, dec!(60000));
        assert_eq!(market.category, "weather");
        assert!(market.end_date.is_some());
    }

    #[test]
    fn test_missing_prices_is_error() {
        let gamma: GammaMarket = serde_json::from_str(r#"{"slug": "x"}"#).unwrap();
        assert!(gamma.into_market().is_err());
    }

    #[test]
    fn test_parse_end_date_formats() {
        assert!(parse_end_date("2025-03-01").is_some());
        assert!(parse_end_date("2025-03-01T00:00:00.000Z").is_some());
        assert!(parse_end_date("soon").is_none());
    }
}
