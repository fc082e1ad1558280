use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

const PAYOUT_COLUMNS: &str = "id, provider_id, source_kind, period_start, period_end, \
     gross_amount, fees_deducted, net_amount, currency_code, status, on_hold, on_hold_reason, \
     gateway_payout_id, created_at, updated_at";

/// Aggregated provider payout for a period. The hold is orthogonal to the
/// status: a held schedule keeps its status and simply cannot progress until
/// released.
#[derive(Debug, Clone, FromRow)]
pub struct PayoutSchedule {
    pub id: Uuid,
    pub provider_id: String,
    pub source_kind: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub gross_amount: BigDecimal,
    pub fees_deducted: BigDecimal,
    pub net_amount: BigDecimal,
    pub currency_code: String,
    pub status: String,
    pub on_hold: bool,
    pub on_hold_reason: Option<String>,
    pub gateway_payout_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayoutSchedule {
    pub provider_id: String,
    pub source_kind: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub gross_amount: BigDecimal,
    pub fees_deducted: BigDecimal,
    pub net_amount: BigDecimal,
    pub currency_code: String,
    pub on_hold: bool,
    pub on_hold_reason: Option<String>,
}

/// Aggregate totals over a provider's payout records, across both the
/// per-transaction and per-consultation families.
#[derive(Debug, Clone, FromRow)]
pub struct PayoutTotals {
    pub on_hold_count: i64,
    pub on_hold_total: Option<BigDecimal>,
    pub pending_total: Option<BigDecimal>,
    pub completed_total: Option<BigDecimal>,
}

pub struct PayoutRepository {
    pool: PgPool,
}

impl PayoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: &NewPayoutSchedule) -> Result<PayoutSchedule, DatabaseError> {
        let sql = format!(
            "INSERT INTO payout_schedules \
             (provider_id, source_kind, period_start, period_end, gross_amount, fees_deducted, \
              net_amount, currency_code, status, on_hold, on_hold_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'scheduled', $9, $10) \
             RETURNING {}",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(&new.provider_id)
            .bind(&new.source_kind)
            .bind(new.period_start)
            .bind(new.period_end)
            .bind(&new.gross_amount)
            .bind(&new.fees_deducted)
            .bind(&new.net_amount)
            .bind(&new.currency_code)
            .bind(new.on_hold)
            .bind(&new.on_hold_reason)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PayoutSchedule>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payout_schedules WHERE id = $1",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn lock_by_id(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<PayoutSchedule>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payout_schedules WHERE id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Lock the schedule mirroring a gateway-side payout id.
    pub async fn lock_by_gateway_payout_id(
        &self,
        conn: &mut PgConnection,
        gateway_payout_id: i64,
    ) -> Result<Option<PayoutSchedule>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payout_schedules WHERE gateway_payout_id = $1 FOR UPDATE",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(gateway_payout_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn update_status(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
    ) -> Result<PayoutSchedule, DatabaseError> {
        let sql = format!(
            "UPDATE payout_schedules SET status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_processing(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        gateway_payout_id: i64,
    ) -> Result<PayoutSchedule, DatabaseError> {
        let sql = format!(
            "UPDATE payout_schedules \
             SET status = 'processing', gateway_payout_id = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            PAYOUT_COLUMNS
        );

        sqlx::query_as::<_, PayoutSchedule>(&sql)
            .bind(id)
            .bind(gateway_payout_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Place every non-terminal payout of a provider on hold.
    pub async fn hold_all(
        &self,
        provider_id: &str,
        reason: &str,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payout_schedules \
             SET on_hold = TRUE, on_hold_reason = $2, updated_at = NOW() \
             WHERE provider_id = $1 \
               AND on_hold = FALSE \
               AND status IN ('scheduled', 'processing')",
        )
        .bind(provider_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Release every held payout of a provider. Idempotent: releasing an
    /// already-released provider affects zero rows.
    pub async fn release_all(&self, provider_id: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payout_schedules \
             SET on_hold = FALSE, on_hold_reason = NULL, updated_at = NOW() \
             WHERE provider_id = $1 AND on_hold = TRUE",
        )
        .bind(provider_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Aggregate held/pending/completed totals across all source kinds.
    pub async fn totals_for_provider(
        &self,
        provider_id: &str,
    ) -> Result<PayoutTotals, DatabaseError> {
        sqlx::query_as::<_, PayoutTotals>(
            "SELECT \
                 COUNT(*) FILTER (WHERE on_hold) AS on_hold_count, \
                 SUM(net_amount) FILTER (WHERE on_hold) AS on_hold_total, \
                 SUM(net_amount) FILTER (WHERE NOT on_hold AND status IN ('scheduled', 'processing')) AS pending_total, \
                 SUM(net_amount) FILTER (WHERE status = 'completed') AS completed_total \
             FROM payout_schedules \
             WHERE provider_id = $1",
        )
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
