use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use common::{Error, PriceFeed, Result, TokenPrice, TokenQuote};

/// REST client for the Moralis EVM token price API.
pub struct MoralisClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl MoralisClient {
    /// `timeout` caps every request end to end.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn read_body(resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::FeedUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::FeedUnavailable(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl PriceFeed for MoralisClient {
    async fn fetch_multiple_prices(
        &self,
        chain: &str,
        token_addresses: &[String],
    ) -> Result<Vec<TokenQuote>> {
        let url = format!("{}/erc20/prices", self.base_url);
        let tokens: Vec<Value> = token_addresses
            .iter()
            .map(|addr| json!({ "token_address": addr }))
            .collect();

        debug!(chain, count = token_addresses.len(), "Requesting batch token prices");
        let resp = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("chain", chain), ("include", "percent_change")])
            .json(&json!({ "tokens": tokens }))
            .send()
            .await
            .map_err(|e| Error::FeedUnavailable(e.to_string()))?;

        let body = Self::read_body(resp).await?;
        parse_multiple_prices(&body)
    }

    async fn fetch_single_price(&self, chain: &str, token_address: &str) -> Result<TokenPrice> {
        let url = format!("{}/erc20/{token_address}/price", self.base_url);

        debug!(chain, token = token_address, "Requesting token price");
        let resp = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("chain", chain)])
            .send()
            .await
            .map_err(|e| Error::FeedUnavailable(e.to_string()))?;

        let body = Self::read_body(resp).await?;
        parse_single_price(&body)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiPriceEntry {
    token_address: String,
    usd_price: f64,
    #[serde(default)]
    usd_price_formatted: Option<String>,
    #[serde(rename = "24hrPercentChange", default)]
    percent_change_24h: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SinglePriceResponse {
    usd_price: f64,
    #[serde(default)]
    usd_price_formatted: Option<String>,
}

fn parse_multiple_prices(body: &str) -> Result<Vec<TokenQuote>> {
    let entries: Vec<MultiPriceEntry> = serde_json::from_str(body)
        .map_err(|e| Error::FeedUnavailable(format!("unexpected batch payload: {e}")))?;

    Ok(entries
        .into_iter()
        .map(|e| TokenQuote {
            usd_price_formatted: e
                .usd_price_formatted
                .unwrap_or_else(|| e.usd_price.to_string()),
            token_address: e.token_address,
            usd_price: e.usd_price,
            percent_change_24h_raw: e.percent_change_24h.as_ref().and_then(numeric),
        })
        .collect())
}

fn parse_single_price(body: &str) -> Result<TokenPrice> {
    let resp: SinglePriceResponse = serde_json::from_str(body)
        .map_err(|e| Error::FeedUnavailable(format!("unexpected price payload: {e}")))?;

    Ok(TokenPrice {
        usd_price_formatted: resp
            .usd_price_formatted
            .unwrap_or_else(|| resp.usd_price.to_string()),
        usd_price: resp.usd_price,
    })
}

/// Moralis sends the 24h change as a string; accept plain numbers too.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
