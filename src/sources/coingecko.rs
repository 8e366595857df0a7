//! CoinGecko price provider.
//!
//! Spot prices come from `/simple/price` in one request for all ids; price
//! histories from `/coins/{id}/market_chart`. Price keys are expected to be
//! CoinGecko coin ids (tokens without one fall back to their symbol or
//! contract address, which CoinGecko will usually not recognise; those keys
//! are simply absent from the response).

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use serde::Deserialize;

use crate::models::{PriceKey, PricePoint, Timeframe};

use super::PriceProvider;

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const USER_AGENT: &str = concat!("walletfolio/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(f64, f64)>,
}

pub struct CoinGeckoPriceProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoPriceProvider {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_BASE.to_string(),
            api_key: None,
        }
    }

    /// Point the provider at another host (a mirror, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Demo API key, sent as `x-cg-demo-api-key`.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("CoinGecko API error on {path}: {status} - {body}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode CoinGecko response from {path}"))
    }
}

impl Default for CoinGeckoPriceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PriceProvider for CoinGeckoPriceProvider {
    async fn fetch_prices(
        &self,
        keys: &[PriceKey],
        currency: &str,
        _timeframe: Timeframe,
    ) -> Result<HashMap<PriceKey, String>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let currency = currency.trim().to_lowercase();
        let ids = keys
            .iter()
            .map(PriceKey::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let data: HashMap<String, HashMap<String, f64>> = self
            .get_json(
                "/simple/price",
                &[("ids", ids), ("vs_currencies", currency.clone())],
            )
            .await?;

        Ok(data
            .into_iter()
            .filter_map(|(id, quotes)| {
                quotes
                    .get(&currency)
                    .map(|price| (PriceKey::new(id), price.to_string()))
            })
            .collect())
    }

    async fn fetch_price_history(
        &self,
        key: &PriceKey,
        currency: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>> {
        let days = match timeframe.days() {
            Some(days) => days.to_string(),
            None => "max".to_string(),
        };

        let data: MarketChartResponse = self
            .get_json(
                &format!("/coins/{}/market_chart", key.as_str()),
                &[
                    ("vs_currency", currency.trim().to_lowercase()),
                    ("days", days),
                ],
            )
            .await?;

        data.prices
            .into_iter()
            .map(|(millis, price)| {
                let timestamp = DateTime::from_timestamp_millis(millis as i64)
                    .with_context(|| format!("Invalid timestamp in price history: {millis}"))?;
                Ok(PricePoint::new(timestamp, price.to_string()))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
