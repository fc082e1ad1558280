//! Rate providers for the external API tier of rate resolution.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::currency::conversion::{ConversionError, ConversionResult, RateProvider};

/// Provider backed by an open exchange-rate HTTP API
/// (`GET {base_url}/{from}` returning a `rates` map keyed by currency code).
///
/// Failures here are non-fatal: the conversion service falls through to the
/// static table.
pub struct ExchangeRateApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: String, timeout_secs: u64) -> ConversionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConversionError::Provider(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait::async_trait]
impl RateProvider for ExchangeRateApiProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> ConversionResult<BigDecimal> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), from);
        debug!(%url, %from, %to, "fetching rate from external API");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ConversionError::Provider(format!("rate API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ConversionError::Provider(format!(
                "rate API returned HTTP {}",
                response.status()
            )));
        }

        let body: RatesResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::Provider(format!("invalid rate API response: {}", e)))?;

        let raw = body
            .rates
            .get(&to.to_uppercase())
            .copied()
            .ok_or_else(|| ConversionError::CurrencyUnsupported {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        BigDecimal::from_str(&raw.to_string())
            .map_err(|e| ConversionError::InvalidRate(e.to_string()))
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "ExchangeRateApiProvider"
    }
}

/// Mock rate provider for testing.
#[cfg(test)]
pub struct MockRateProvider {
    rate: BigDecimal,
    healthy: bool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockRateProvider {
    pub fn new(rate: &str) -> Self {
        Self {
            rate: BigDecimal::from_str(rate).unwrap(),
            healthy: true,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl RateProvider for MockRateProvider {
    async fn fetch_rate(&self, _from: &str, _to: &str) -> ConversionResult<BigDecimal> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.rate.clone())
    }

    async fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "MockRateProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_counts_fetches() {
        let provider = MockRateProvider::new("655.957");
        assert!(provider.is_healthy().await);
        let rate = provider.fetch_rate("EUR", "XOF").await.unwrap();
        assert_eq!(rate, BigDecimal::from_str("655.957").unwrap());
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn rates_response_parses_the_expected_shape() {
        let body = r#"{"result":"success","rates":{"XOF":655.957,"EUR":1.0}}"#;
        let parsed: RatesResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.rates.contains_key("XOF"));
    }
}
