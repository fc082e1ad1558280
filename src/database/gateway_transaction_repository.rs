use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

const GATEWAY_TRANSACTION_COLUMNS: &str = "id, gateway_provider, gateway_txn_id, \
     gateway_reference, amount_reference, amount_local, currency_code, exchange_rate_used, \
     converted_at, status, payload_log, gateway_fees, gateway_commission, amount_transferred, \
     last_error_code, last_error_message, created_at, updated_at";

/// Mirror of the external gateway's transaction. `gateway_txn_id` is null
/// until the create call succeeds; `payload_log` is an append-only JSONB
/// array of webhook payloads received for it.
#[derive(Debug, Clone, FromRow)]
pub struct GatewayTransaction {
    pub id: Uuid,
    pub gateway_provider: String,
    pub gateway_txn_id: Option<i64>,
    pub gateway_reference: Option<String>,
    pub amount_reference: BigDecimal,
    pub amount_local: BigDecimal,
    pub currency_code: String,
    pub exchange_rate_used: BigDecimal,
    pub converted_at: DateTime<Utc>,
    pub status: String,
    pub payload_log: serde_json::Value,
    pub gateway_fees: Option<BigDecimal>,
    pub gateway_commission: Option<BigDecimal>,
    pub amount_transferred: Option<BigDecimal>,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGatewayTransaction {
    pub gateway_provider: String,
    pub gateway_txn_id: i64,
    pub gateway_reference: String,
    pub amount_reference: BigDecimal,
    pub amount_local: BigDecimal,
    pub currency_code: String,
    pub exchange_rate_used: BigDecimal,
    pub converted_at: DateTime<Utc>,
}

pub struct GatewayTransactionRepository {
    pool: PgPool,
}

impl GatewayTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        new: &NewGatewayTransaction,
    ) -> Result<GatewayTransaction, DatabaseError> {
        let sql = format!(
            "INSERT INTO gateway_transactions \
             (gateway_provider, gateway_txn_id, gateway_reference, amount_reference, \
              amount_local, currency_code, exchange_rate_used, converted_at, status, payload_log) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', '[]'::jsonb) \
             RETURNING {}",
            GATEWAY_TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, GatewayTransaction>(&sql)
            .bind(&new.gateway_provider)
            .bind(new.gateway_txn_id)
            .bind(&new.gateway_reference)
            .bind(&new.amount_reference)
            .bind(&new.amount_local)
            .bind(&new.currency_code)
            .bind(&new.exchange_rate_used)
            .bind(new.converted_at)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<GatewayTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM gateway_transactions WHERE id = $1",
            GATEWAY_TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, GatewayTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Lock the row mirroring a gateway-side transaction id.
    pub async fn lock_by_gateway_txn_id(
        &self,
        conn: &mut PgConnection,
        gateway_txn_id: i64,
    ) -> Result<Option<GatewayTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM gateway_transactions WHERE gateway_txn_id = $1 FOR UPDATE",
            GATEWAY_TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, GatewayTransaction>(&sql)
            .bind(gateway_txn_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Append a webhook payload to the ordered payload log.
    pub async fn append_payload(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE gateway_transactions \
             SET payload_log = payload_log || jsonb_build_array($2::jsonb), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(payload)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Mark approved and copy the fees/commission the gateway reported.
    pub async fn mark_approved(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        gateway_fees: Option<&BigDecimal>,
        gateway_commission: Option<&BigDecimal>,
        amount_transferred: Option<&BigDecimal>,
    ) -> Result<GatewayTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE gateway_transactions \
             SET status = 'approved', gateway_fees = $2, gateway_commission = $3, \
                 amount_transferred = $4, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            GATEWAY_TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, GatewayTransaction>(&sql)
            .bind(id)
            .bind(gateway_fees)
            .bind(gateway_commission)
            .bind(amount_transferred)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Status update with the gateway's error details attached.
    pub async fn mark_status(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
        last_error_code: Option<&str>,
        last_error_message: Option<&str>,
    ) -> Result<GatewayTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE gateway_transactions \
             SET status = $2, last_error_code = $3, last_error_message = $4, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            GATEWAY_TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, GatewayTransaction>(&sql)
            .bind(id)
            .bind(status)
            .bind(last_error_code)
            .bind(last_error_message)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
