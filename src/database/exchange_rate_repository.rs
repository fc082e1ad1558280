use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Persisted exchange rate row. Every resolved rate is recorded with its
/// source tag, so the table doubles as the conversion audit trail.
#[derive(Debug, Clone, FromRow)]
pub struct ExchangeRateRow {
    pub id: Uuid,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: BigDecimal,
    pub source: String,
    pub active: bool,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

pub struct ExchangeRateRepository {
    pool: PgPool,
}

impl ExchangeRateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent active rate for a currency pair.
    pub async fn get_current_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<Option<ExchangeRateRow>, DatabaseError> {
        sqlx::query_as::<_, ExchangeRateRow>(
            "SELECT id, from_currency, to_currency, rate, source, active, fetched_at \
             FROM exchange_rates \
             WHERE from_currency = $1 AND to_currency = $2 AND active = TRUE \
             ORDER BY fetched_at DESC \
             LIMIT 1",
        )
        .bind(from_currency)
        .bind(to_currency)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record a resolved rate with its source tag.
    pub async fn record_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
        rate: &BigDecimal,
        source: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO exchange_rates (from_currency, to_currency, rate, source, active) \
             VALUES ($1, $2, $3, $4, TRUE)",
        )
        .bind(from_currency)
        .bind(to_currency)
        .bind(rate)
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Deactivate all rates for a pair (administrative).
    pub async fn deactivate_pair(
        &self,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE exchange_rates SET active = FALSE \
             WHERE from_currency = $1 AND to_currency = $2 AND active = TRUE",
        )
        .bind(from_currency)
        .bind(to_currency)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }
}
