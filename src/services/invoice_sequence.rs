//! Invoice Sequence Service
//!
//! Issues human-readable invoice numbers from one global counter under a row
//! lock, so numbers from different provider roles interleave into a single
//! monotonic audit sequence. A separately-sequenced per-month receipt
//! tracking number exists for internal audit and is never shown to users.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::debug;

use crate::database::error::DatabaseError;
use crate::database::invoice_repository::InvoiceRepository;
use crate::types::ProviderRole;

const RECEIPT_PREFIX: &str = "RCT";

pub struct InvoiceSequenceService {
    repository: Arc<InvoiceRepository>,
}

impl InvoiceSequenceService {
    pub fn new(repository: Arc<InvoiceRepository>) -> Self {
        Self { repository }
    }

    /// Issue the next invoice number for a role. Runs inside the caller's
    /// transaction: the counter lock is held until that transaction commits,
    /// and the number is rolled back with it on failure.
    pub async fn next_invoice_number(
        &self,
        conn: &mut PgConnection,
        role: ProviderRole,
    ) -> Result<(String, i64), DatabaseError> {
        let sequence = self.repository.next_sequence(conn).await?;
        let number = Self::render_invoice_number(role, sequence);
        debug!(%number, sequence, role = %role, "invoice number issued");
        Ok((number, sequence))
    }

    /// Standalone issuance in its own transaction, for callers that are not
    /// already inside one.
    pub async fn issue_invoice_number(
        &self,
        role: ProviderRole,
    ) -> Result<(String, i64), DatabaseError> {
        let mut tx = self
            .repository
            .pool()
            .begin()
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let issued = self.next_invoice_number(&mut tx, role).await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(issued)
    }

    /// Issue the next internal receipt tracking number for the calendar
    /// month of `now`.
    pub async fn next_receipt_number(
        &self,
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<String, DatabaseError> {
        let period = now.format("%Y%m").to_string();
        let sequence = self
            .repository
            .next_receipt_sequence(conn, &period)
            .await?;
        Ok(Self::render_receipt_number(&period, sequence))
    }

    pub fn render_invoice_number(role: ProviderRole, sequence: i64) -> String {
        format!("{}-{:06}", role.invoice_prefix(), sequence)
    }

    pub fn render_receipt_number(period: &str, sequence: i64) -> String {
        format!("{}-{}-{:06}", RECEIPT_PREFIX, period, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_numbers_carry_the_role_prefix() {
        assert_eq!(
            InvoiceSequenceService::render_invoice_number(ProviderRole::Doctor, 124),
            "D-000124"
        );
        assert_eq!(
            InvoiceSequenceService::render_invoice_number(ProviderRole::Insurer, 125),
            "I-000125"
        );
    }

    #[test]
    fn sequences_interleave_across_roles() {
        // One global counter: consecutive issues for different roles share
        // the sequence space.
        let a = InvoiceSequenceService::render_invoice_number(ProviderRole::Doctor, 41);
        let b = InvoiceSequenceService::render_invoice_number(ProviderRole::Hospital, 42);
        assert_eq!(a, "D-000041");
        assert_eq!(b, "H-000042");
    }

    #[test]
    fn receipt_numbers_follow_the_monthly_template() {
        assert_eq!(
            InvoiceSequenceService::render_receipt_number("202608", 42),
            "RCT-202608-000042"
        );
    }
}
