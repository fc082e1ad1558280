use sqlx::{FromRow, PgConnection, PgPool};

use crate::database::error::DatabaseError;

/// Sequence storage for invoice and receipt numbers.
///
/// The invoice counter is a single global row; callers lock it for the
/// duration of their transaction, so concurrent issuance serializes and the
/// sequence stays strictly increasing with no gaps inside a commit.
pub struct InvoiceRepository {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct SequenceRow {
    last_sequence: i64,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Increment the single global invoice counter under its row lock.
    /// Participates in the caller's transaction.
    pub async fn next_sequence(&self, conn: &mut PgConnection) -> Result<i64, DatabaseError> {
        let current = sqlx::query_as::<_, SequenceRow>(
            "SELECT last_sequence FROM invoice_sequences WHERE id = 1 FOR UPDATE",
        )
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let next = current.last_sequence + 1;

        sqlx::query("UPDATE invoice_sequences SET last_sequence = $1 WHERE id = 1")
            .bind(next)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(next)
    }

    /// Increment the per-calendar-month receipt counter, creating the month
    /// row on first use.
    pub async fn next_receipt_sequence(
        &self,
        conn: &mut PgConnection,
        period: &str,
    ) -> Result<i64, DatabaseError> {
        let row = sqlx::query_as::<_, SequenceRow>(
            "INSERT INTO receipt_sequences (period, last_sequence) \
             VALUES ($1, 1) \
             ON CONFLICT (period) \
             DO UPDATE SET last_sequence = receipt_sequences.last_sequence + 1 \
             RETURNING last_sequence",
        )
        .bind(period)
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.last_sequence)
    }
}
