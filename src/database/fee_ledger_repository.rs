use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::types::FeeStatus;

const FEE_LEDGER_COLUMNS: &str = "id, transaction_id, provider_id, provider_role, \
     service_amount, fee_amount, fee_percent, status, payment_method, collection_method, \
     receipt_number, collected_at, created_at";

/// One collected-or-pending platform fee. Append-only: refunds are reversed
/// by inserting a negated row, never by mutating the original.
#[derive(Debug, Clone, FromRow)]
pub struct FeeLedgerEntry {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider_id: String,
    pub provider_role: String,
    pub service_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub fee_percent: BigDecimal,
    pub status: String,
    pub payment_method: String,
    pub collection_method: String,
    pub receipt_number: Option<String>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeeLedgerEntry {
    pub transaction_id: Option<Uuid>,
    pub provider_id: String,
    pub provider_role: String,
    pub service_amount: BigDecimal,
    pub fee_amount: BigDecimal,
    pub fee_percent: BigDecimal,
    pub status: String,
    pub payment_method: String,
    pub collection_method: String,
    pub receipt_number: Option<String>,
}

impl NewFeeLedgerEntry {
    /// Reversal entry for a refunded transaction: same provider and
    /// transaction, negated amounts, its own collection method.
    pub fn reversal_of(original: &FeeLedgerEntry) -> Self {
        Self {
            transaction_id: original.transaction_id,
            provider_id: original.provider_id.clone(),
            provider_role: original.provider_role.clone(),
            service_amount: -original.service_amount.clone(),
            fee_amount: -original.fee_amount.clone(),
            fee_percent: original.fee_percent.clone(),
            status: FeeStatus::Collected.as_str().to_string(),
            payment_method: original.payment_method.clone(),
            collection_method: "refund_reversal".to_string(),
            receipt_number: None,
        }
    }
}

pub struct FeeLedgerRepository {
    pool: PgPool,
}

impl FeeLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        new: &NewFeeLedgerEntry,
    ) -> Result<FeeLedgerEntry, DatabaseError> {
        let sql = format!(
            "INSERT INTO fee_ledger \
             (transaction_id, provider_id, provider_role, service_amount, fee_amount, \
              fee_percent, status, payment_method, collection_method, receipt_number, \
              collected_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     CASE WHEN $7 = 'collected' THEN NOW() ELSE NULL END) \
             RETURNING {}",
            FEE_LEDGER_COLUMNS
        );

        sqlx::query_as::<_, FeeLedgerEntry>(&sql)
            .bind(new.transaction_id)
            .bind(&new.provider_id)
            .bind(&new.provider_role)
            .bind(&new.service_amount)
            .bind(&new.fee_amount)
            .bind(&new.fee_percent)
            .bind(&new.status)
            .bind(&new.payment_method)
            .bind(&new.collection_method)
            .bind(&new.receipt_number)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// All entries for a transaction, oldest first. Locked so refund
    /// reversal runs against a stable view.
    pub async fn lock_by_transaction(
        &self,
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<Vec<FeeLedgerEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM fee_ledger \
             WHERE transaction_id = $1 \
             ORDER BY created_at ASC \
             FOR UPDATE",
            FEE_LEDGER_COLUMNS
        );

        sqlx::query_as::<_, FeeLedgerEntry>(&sql)
            .bind(transaction_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_provider(
        &self,
        provider_id: &str,
    ) -> Result<Vec<FeeLedgerEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM fee_ledger \
             WHERE provider_id = $1 \
             ORDER BY created_at DESC",
            FEE_LEDGER_COLUMNS
        );

        sqlx::query_as::<_, FeeLedgerEntry>(&sql)
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Net collected fee total for a provider (reversals included).
    pub async fn collected_total(&self, provider_id: &str) -> Result<BigDecimal, DatabaseError> {
        #[derive(FromRow)]
        struct Total {
            total: Option<BigDecimal>,
        }

        let row = sqlx::query_as::<_, Total>(
            "SELECT SUM(fee_amount) AS total \
             FROM fee_ledger \
             WHERE provider_id = $1 AND status = 'collected'",
        )
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.total.unwrap_or_else(|| BigDecimal::from(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversal_negates_amounts_and_keeps_the_link() {
        let original = FeeLedgerEntry {
            id: Uuid::new_v4(),
            transaction_id: Some(Uuid::new_v4()),
            provider_id: "prov_1".to_string(),
            provider_role: "doctor".to_string(),
            service_amount: BigDecimal::from(10000),
            fee_amount: BigDecimal::from(118),
            fee_percent: BigDecimal::from(1),
            status: "collected".to_string(),
            payment_method: "mobile_money".to_string(),
            collection_method: "gateway_split".to_string(),
            receipt_number: Some("RCT-202608-000001".to_string()),
            collected_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        let reversal = NewFeeLedgerEntry::reversal_of(&original);
        assert_eq!(reversal.fee_amount, BigDecimal::from(-118));
        assert_eq!(reversal.service_amount, BigDecimal::from(-10000));
        assert_eq!(reversal.transaction_id, original.transaction_id);
        assert_eq!(reversal.collection_method, "refund_reversal");
        // The original's receipt number is not reused.
        assert_eq!(reversal.receipt_number, None);
    }
}
