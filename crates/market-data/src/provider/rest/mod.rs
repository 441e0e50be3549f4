//! Generic REST quote provider.
//!
//! Talks to a JSON quote endpoint of the form `GET {base}/quote/{symbol}`.
//! Responses are parsed through [`RawQuote`] so partially-populated payloads
//! degrade to zeroed fields instead of failing the fetch.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::errors::{MarketDataError, Result};
use crate::models::{Quote, RawQuote};
use crate::provider::MarketDataProvider;

const PROVIDER_ID: &str = "REST";

/// Short per-request budget so one stuck symbol cannot stall a polling cycle.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RestQuoteProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestQuoteProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!(
            "{}/quote/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol)
        )
    }
}

#[async_trait]
impl MarketDataProvider for RestQuoteProvider {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let mut request = self.client.get(self.quote_url(symbol));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout(symbol.to_string())
            } else {
                MarketDataError::Http(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        if !status.is_success() {
            debug!("quote endpoint returned {} for '{}'", status, symbol);
            return Err(MarketDataError::provider(
                PROVIDER_ID,
                format!("HTTP {} for {}", status, symbol),
            ));
        }

        let raw: RawQuote = response.json().await.map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("JSON parse error: {}", e))
        })?;

        Ok(Quote::from_raw(symbol, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_url_encodes_market_suffixes() {
        let provider = RestQuoteProvider::new("https://feed.example/v1/", None);
        assert_eq!(
            provider.quote_url("RY.TO"),
            "https://feed.example/v1/quote/RY.TO"
        );
        assert_eq!(
            provider.quote_url("BRK B"),
            "https://feed.example/v1/quote/BRK%20B"
        );
    }
}
