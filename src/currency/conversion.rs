//! Currency Conversion Service
//!
//! Resolves exchange rates through a tiered chain: identity short-circuit,
//! in-memory cache, persisted rate store, external rate API, static fallback
//! table. Every rate resolved below the cache tier is cached and persisted
//! with a source tag for audit. If no tier resolves, the operation fails with
//! `CurrencyUnsupported`, never a silently wrong rate.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CurrencyConfig;
use crate::context::RegionContext;
use crate::currency::{self, static_fallback_rate};
use crate::database::error::DatabaseError;
use crate::database::exchange_rate_repository::ExchangeRateRepository;
use crate::types::MoneySnapshot;

/// Currency conversion error
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("No exchange rate available for {from} -> {to}")]
    CurrencyUnsupported { from: String, to: String },

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Rate provider error: {0}")]
    Provider(String),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Identity,
    Cache,
    Db,
    Api,
    Static,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Identity => "identity",
            RateSource::Cache => "cache",
            RateSource::Db => "db",
            RateSource::Api => "api",
            RateSource::Static => "static",
        }
    }
}

/// A resolved exchange rate with its provenance.
#[derive(Debug, Clone)]
pub struct Rate {
    pub value: BigDecimal,
    pub source: RateSource,
    pub fetched_at: DateTime<Utc>,
}

/// Rate provider trait for fetching exchange rates from external sources.
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the current rate between two currencies.
    async fn fetch_rate(&self, from: &str, to: &str) -> ConversionResult<BigDecimal>;

    /// Check if provider is healthy.
    async fn is_healthy(&self) -> bool;

    /// Get provider name.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
struct CachedRate {
    rate: BigDecimal,
    cached_at: DateTime<Utc>,
}

/// Main currency conversion service.
pub struct CurrencyConversionService {
    repository: ExchangeRateRepository,
    providers: Vec<Arc<dyn RateProvider>>,
    cache: RwLock<HashMap<(String, String), CachedRate>>,
    config: CurrencyConfig,
}

impl CurrencyConversionService {
    pub fn new(repository: ExchangeRateRepository, config: CurrencyConfig) -> Self {
        Self {
            repository,
            providers: Vec::new(),
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Add a rate provider to the API tier.
    pub fn add_provider(mut self, provider: Arc<dyn RateProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn reference_currency(&self) -> &str {
        &self.config.reference_currency
    }

    /// Resolve the exchange rate between two currency codes.
    pub async fn get_rate(
        &self,
        ctx: &RegionContext,
        from: &str,
        to: &str,
    ) -> ConversionResult<Rate> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();

        if from == to {
            return Ok(Rate {
                value: BigDecimal::from(1),
                source: RateSource::Identity,
                fetched_at: Utc::now(),
            });
        }

        if let Some(cached) = self.get_cached_rate(&from, &to).await {
            debug!(region = %ctx.region, %from, %to, "rate cache hit");
            return Ok(Rate {
                value: cached,
                source: RateSource::Cache,
                fetched_at: Utc::now(),
            });
        }

        // Persisted tier is best-effort: an unreachable store falls through
        // to the API tier rather than failing the conversion.
        match self.repository.get_current_rate(&from, &to).await {
            Ok(Some(row)) => {
                self.prime_cache(&from, &to, &row.rate).await;
                return Ok(Rate {
                    value: row.rate,
                    source: RateSource::Db,
                    fetched_at: row.fetched_at,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%from, %to, error = %e, "persisted rate lookup failed");
            }
        }

        for provider in &self.providers {
            if !provider.is_healthy().await {
                continue;
            }
            match provider.fetch_rate(&from, &to).await {
                Ok(rate) => {
                    self.validate_rate(&rate)?;
                    self.persist_rate(&from, &to, &rate, RateSource::Api).await;
                    self.prime_cache(&from, &to, &rate).await;
                    return Ok(Rate {
                        value: rate,
                        source: RateSource::Api,
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), %from, %to, error = %e, "rate provider failed");
                    continue;
                }
            }
        }

        if let Some(rate) = static_fallback_rate(&from, &to) {
            self.persist_rate(&from, &to, &rate, RateSource::Static)
                .await;
            self.prime_cache(&from, &to, &rate).await;
            return Ok(Rate {
                value: rate,
                source: RateSource::Static,
                fetched_at: Utc::now(),
            });
        }

        Err(ConversionError::CurrencyUnsupported { from, to })
    }

    /// Convert an amount between currencies, rounding half-up to the target
    /// currency's minor-unit precision.
    pub async fn convert(
        &self,
        ctx: &RegionContext,
        amount: &BigDecimal,
        from: &str,
        to: &str,
    ) -> ConversionResult<BigDecimal> {
        let rate = self.get_rate(ctx, from, to).await?;
        Ok(currency::round_amount(&(amount * &rate.value), to))
    }

    /// Capture the dual-currency snapshot for a reference-currency amount.
    pub async fn snapshot(
        &self,
        ctx: &RegionContext,
        amount_reference: &BigDecimal,
        local_currency: &str,
    ) -> ConversionResult<MoneySnapshot> {
        let local_currency = local_currency.to_uppercase();
        let rate = self
            .get_rate(ctx, &self.config.reference_currency, &local_currency)
            .await?;
        let amount_local = currency::round_amount(&(amount_reference * &rate.value), &local_currency);

        Ok(MoneySnapshot {
            amount_reference: amount_reference.clone(),
            amount_local,
            currency_code: local_currency,
            exchange_rate_used: rate.value,
            converted_at: Utc::now(),
        })
    }

    /// Administrative rate upsert with validation and cache invalidation.
    pub async fn update_rate(
        &self,
        ctx: &RegionContext,
        from: &str,
        to: &str,
        rate: BigDecimal,
        source: &str,
    ) -> ConversionResult<()> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        self.validate_rate(&rate)?;

        self.repository
            .record_rate(&from, &to, &rate, source)
            .await?;
        self.invalidate_cache(&from, &to).await;

        debug!(region = %ctx.region, %from, %to, %rate, source, "rate updated");
        Ok(())
    }

    pub async fn invalidate_cache(&self, from: &str, to: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(&(from.to_uppercase(), to.to_uppercase()));
    }

    fn validate_rate(&self, rate: &BigDecimal) -> ConversionResult<()> {
        if rate <= &BigDecimal::from(0) {
            return Err(ConversionError::InvalidRate(
                "rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    async fn get_cached_rate(&self, from: &str, to: &str) -> Option<BigDecimal> {
        let cache = self.cache.read().await;
        let cached = cache.get(&(from.to_string(), to.to_string()))?;
        let age = Utc::now().signed_duration_since(cached.cached_at);
        if age.num_seconds() < self.config.cache_ttl_seconds as i64 {
            Some(cached.rate.clone())
        } else {
            None
        }
    }

    async fn prime_cache(&self, from: &str, to: &str, rate: &BigDecimal) {
        let mut cache = self.cache.write().await;
        cache.insert(
            (from.to_string(), to.to_string()),
            CachedRate {
                rate: rate.clone(),
                cached_at: Utc::now(),
            },
        );
    }

    async fn persist_rate(&self, from: &str, to: &str, rate: &BigDecimal, source: RateSource) {
        if let Err(e) = self
            .repository
            .record_rate(from, to, rate, source.as_str())
            .await
        {
            warn!(%from, %to, source = source.as_str(), error = %e, "failed to persist resolved rate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::rate_providers::MockRateProvider;
    use std::str::FromStr;

    fn service() -> CurrencyConversionService {
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/test").unwrap();
        let repository = ExchangeRateRepository::new(pool);
        CurrencyConversionService::new(
            repository,
            CurrencyConfig {
                reference_currency: "XOF".to_string(),
                cache_ttl_seconds: 60,
                rate_api_url: "https://open.er-api.com/v6/latest".to_string(),
                rate_api_timeout_secs: 5,
            },
        )
    }

    #[tokio::test]
    async fn identity_conversion_short_circuits() {
        let ctx = RegionContext::default();
        let provider = Arc::new(MockRateProvider::new("2.0"));
        let service = service().add_provider(provider.clone());

        let converted = service
            .convert(&ctx, &BigDecimal::from(100), "XOF", "XOF")
            .await
            .unwrap();
        assert_eq!(converted, BigDecimal::from(100));
        // The provider tier was never consulted.
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn provider_rate_is_cached_for_subsequent_lookups() {
        let ctx = RegionContext::default();
        let provider = Arc::new(MockRateProvider::new("655.957"));
        let service = service().add_provider(provider.clone());

        let first = service.get_rate(&ctx, "EUR", "XOF").await.unwrap();
        assert_eq!(first.source, RateSource::Api);

        let second = service.get_rate(&ctx, "EUR", "XOF").await.unwrap();
        assert_eq!(second.source, RateSource::Cache);
        assert_eq!(second.value, first.value);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn static_table_is_the_last_resort() {
        let ctx = RegionContext::default();
        let service = service();

        let rate = service.get_rate(&ctx, "EUR", "XOF").await.unwrap();
        assert_eq!(rate.source, RateSource::Static);
        assert_eq!(rate.value, BigDecimal::from_str("655.957").unwrap());
    }

    #[tokio::test]
    async fn unknown_pair_fails_instead_of_defaulting() {
        let ctx = RegionContext::default();
        let service = service();

        let result = service.get_rate(&ctx, "XOF", "ZZZ").await;
        assert!(matches!(
            result,
            Err(ConversionError::CurrencyUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn unhealthy_provider_is_skipped() {
        let ctx = RegionContext::default();
        let provider = Arc::new(MockRateProvider::new("700").with_health(false));
        let service = service().add_provider(provider.clone());

        let rate = service.get_rate(&ctx, "EUR", "XOF").await.unwrap();
        assert_eq!(rate.source, RateSource::Static);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn conversion_rounds_to_target_precision() {
        let ctx = RegionContext::default();
        let service = service();

        // 1000 XOF -> EUR at the static 0.00152449 rate = 1.52449, rounded
        // to 1.52 at two decimals.
        let converted = service
            .convert(&ctx, &BigDecimal::from(1000), "XOF", "EUR")
            .await
            .unwrap();
        assert_eq!(converted, BigDecimal::from_str("1.52").unwrap());
    }

    #[tokio::test]
    async fn snapshot_captures_rate_and_local_amount() {
        let ctx = RegionContext::default();
        let service = service();

        let snapshot = service
            .snapshot(&ctx, &BigDecimal::from(10000), "XOF")
            .await
            .unwrap();
        assert_eq!(snapshot.amount_local, BigDecimal::from(10000));
        assert_eq!(snapshot.exchange_rate_used, BigDecimal::from(1));
        assert_eq!(snapshot.currency_code, "XOF");
    }

    #[tokio::test]
    async fn negative_rates_are_rejected() {
        let service = service();
        assert!(service.validate_rate(&BigDecimal::from(-1)).is_err());
        assert!(service.validate_rate(&BigDecimal::from(0)).is_err());
        assert!(service.validate_rate(&BigDecimal::from(1)).is_ok());
    }
}
