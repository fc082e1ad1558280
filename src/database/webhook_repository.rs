use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind};

const WEBHOOK_COLUMNS: &str = "id, event_id, event_type, payload, processed, processing_error, \
     processed_at, gateway_transaction_id, payout_id, created_at";

/// Idempotency record for one gateway event, keyed by the gateway's own
/// event id. Created once; afterwards only the processed flag, the error and
/// the resolution links change.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub gateway_transaction_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the event row if it does not exist yet. Runs outside the
    /// processing transaction so the row survives a dispatch rollback and
    /// failures can be recorded on it.
    pub async fn insert_if_absent(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO webhook_events (event_id, event_type, payload, processed) \
             VALUES ($1, $2, $3, FALSE) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Acquire the row lock for an event before branching on its processed
    /// flag. Two deliveries racing on the same event id serialize here; the
    /// loser observes whatever the winner committed.
    pub async fn lock_by_event_id(
        &self,
        conn: &mut PgConnection,
        event_id: &str,
    ) -> Result<WebhookEvent, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM webhook_events WHERE event_id = $1 FOR UPDATE",
            WEBHOOK_COLUMNS
        );

        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(event_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| {
                DatabaseError::new(DatabaseErrorKind::Unknown {
                    message: format!("webhook event {} missing after insert", event_id),
                })
            })
    }

    /// Flip the processed flag and record what the event resolved, inside
    /// the caller's transaction.
    pub async fn mark_processed(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        gateway_transaction_id: Option<Uuid>,
        payout_id: Option<Uuid>,
    ) -> Result<WebhookEvent, DatabaseError> {
        let sql = format!(
            "UPDATE webhook_events \
             SET processed = TRUE, processing_error = NULL, processed_at = NOW(), \
                 gateway_transaction_id = $2, payout_id = $3 \
             WHERE id = $1 \
             RETURNING {}",
            WEBHOOK_COLUMNS
        );

        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(id)
            .bind(gateway_transaction_id)
            .bind(payout_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Record a dispatch failure, leaving the event eligible for replay.
    /// Runs on the pool, after the processing transaction rolled back.
    pub async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_events \
             SET processed = FALSE, processing_error = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Unprocessed events eligible for manual or scheduled replay.
    pub async fn find_unprocessed(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM webhook_events \
             WHERE processed = FALSE \
             ORDER BY created_at ASC \
             LIMIT $1",
            WEBHOOK_COLUMNS
        );

        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
