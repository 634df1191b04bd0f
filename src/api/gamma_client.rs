//! Polymarket Gamma API client for market listings and quotes.

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use futures::future::join_all;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::Market;

use super::types::GammaMarket;

pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(30);

/// Client for the Gamma API (read-only).
#[derive(Clone)]
pub struct GammaClient {
    client: Client,
    base_url: String,
}

impl GammaClient {
    /// Create a new client against the public Gamma endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(GAMMA_API_BASE.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch open markets ordered by volume, highest first.
    ///
    /// Entries with missing or malformed prices are skipped.
    pub async fn active_markets(&self, limit: u32) -> Result<Vec<Market>> {
        let url = markets_url(&self.base_url, limit);
        debug!(url = %url, "Fetching active markets");

        let raw: Vec<GammaMarket> = self
            .get_json(&url)
            .await
            .context("Failed to fetch active markets")?;

        Ok(raw
            .into_iter()
            .filter(|m| !m.closed)
            .filter_map(|m| {
                let slug = m.slug.clone();
                match m.into_market() {
                    Ok(market) => Some(market),
                    Err(e) => {
                        warn!(market = %slug, error = %e, "Skipping malformed market");
                        None
                    }
                }
            })
            .collect())
    }

    /// Fetch a single market by slug. `None` if Gamma does not know it.
    pub async fn market_by_slug(&self, slug: &str) -> Result<Option<Market>> {
        let url = market_url(&self.base_url, slug)?;
        debug!(url = %url, "Fetching market");

        let raw: Vec<GammaMarket> = self
            .get_json(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch market '{}'", slug))?;

        match raw.into_iter().next() {
            Some(m) => m.into_market().map(Some),
            None => Ok(None),
        }
    }

    /// Current YES price for a market.
    pub async fn yes_price(&self, slug: &str) -> Result<Option<f64>> {
        Ok(self.market_by_slug(slug).await?.map(|m| m.yes_price))
    }

    /// YES prices for several markets, fetched concurrently.
    ///
    /// Results keep input order; failed lookups are logged and come back as `None`.
    pub async fn prices_for(&self, slugs: &[String]) -> Vec<(String, Option<f64>)> {
        let fetches = slugs.iter().map(|slug| async move {
            let price = match self.yes_price(slug).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(market = %slug, error = %e, "Price fetch failed");
                    None
                }
            };
            (slug.clone(), price)
        });
        join_all(fetches).await
    }

    /// GET and decode JSON, retrying connection errors, 429 and 5xx with exponential backoff.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(MAX_RETRY_ELAPSED),
            ..Default::default()
        };

        backoff::future::retry(policy, || {
            let client = self.client.clone();
            let url = url.to_string();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| backoff::Error::transient(anyhow::Error::from(e)))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    let err = anyhow::anyhow!("Gamma request failed: {} - {}", status, body);
                    return Err(if is_transient(status) {
                        debug!(url = %url, status = %status, "Retrying Gamma request");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    });
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| backoff::Error::permanent(anyhow::Error::from(e)))
            }
        })
        .await
        .with_context(|| format!("GET {}", url))
    }
}

fn markets_url(base: &str, limit: u32) -> String {
    format!(
        "{}/markets?closed=false&limit={}&order=volume&ascending=false",
        base, limit
    )
}

/// Single-market lookup with the slug form-encoded as a query parameter.
fn market_url(base: &str, slug: &str) -> Result<Url> {
    Url::parse_with_params(&format!("{}/markets", base), &[("slug", slug)])
        .with_context(|| format!("Invalid Gamma base URL '{}'", base))
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
