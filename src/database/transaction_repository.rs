use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

const TRANSACTION_COLUMNS: &str = "id, reference, payer_id, provider_id, provider_role, \
     service_kind, service_id, amount_reference, amount_local, currency_code, \
     exchange_rate_used, converted_at, payment_method, status, gateway_transaction_id, \
     invoice_number, invoice_sequence, failure_code, failure_message, completed_at, \
     created_at, updated_at";

const FEE_COLUMNS: &str = "id, transaction_id, currency_code, gross_reference, gross_local, \
     commission_rate, commission_reference, commission_local, tax_rate, tax_reference, \
     tax_local, total_fee_reference, total_fee_local, net_reference, net_local, \
     fee_collected, collected_at, created_at";

/// One payer-to-provider payment obligation. The money snapshot columns are
/// immutable after creation; only status, failure fields, invoice fields and
/// timestamps mutate.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceTransaction {
    pub id: Uuid,
    pub reference: String,
    pub payer_id: String,
    pub provider_id: String,
    pub provider_role: String,
    pub service_kind: String,
    pub service_id: String,
    pub amount_reference: BigDecimal,
    pub amount_local: BigDecimal,
    pub currency_code: String,
    pub exchange_rate_used: BigDecimal,
    pub converted_at: DateTime<Utc>,
    pub payment_method: String,
    pub status: String,
    pub gateway_transaction_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub invoice_sequence: Option<i64>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fee breakdown persisted one-to-one with a service transaction.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionFee {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub currency_code: String,
    pub gross_reference: BigDecimal,
    pub gross_local: BigDecimal,
    pub commission_rate: BigDecimal,
    pub commission_reference: BigDecimal,
    pub commission_local: BigDecimal,
    pub tax_rate: BigDecimal,
    pub tax_reference: BigDecimal,
    pub tax_local: BigDecimal,
    pub total_fee_reference: BigDecimal,
    pub total_fee_local: BigDecimal,
    pub net_reference: BigDecimal,
    pub net_local: BigDecimal,
    pub fee_collected: bool,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewServiceTransaction {
    pub reference: String,
    pub payer_id: String,
    pub provider_id: String,
    pub provider_role: String,
    pub service_kind: String,
    pub service_id: String,
    pub amount_reference: BigDecimal,
    pub amount_local: BigDecimal,
    pub currency_code: String,
    pub exchange_rate_used: BigDecimal,
    pub converted_at: DateTime<Utc>,
    pub payment_method: String,
}

#[derive(Debug, Clone)]
pub struct NewTransactionFee {
    pub transaction_id: Uuid,
    pub currency_code: String,
    pub gross_reference: BigDecimal,
    pub gross_local: BigDecimal,
    pub commission_rate: BigDecimal,
    pub commission_reference: BigDecimal,
    pub commission_local: BigDecimal,
    pub tax_rate: BigDecimal,
    pub tax_reference: BigDecimal,
    pub tax_local: BigDecimal,
    pub total_fee_reference: BigDecimal,
    pub total_fee_local: BigDecimal,
    pub net_reference: BigDecimal,
    pub net_local: BigDecimal,
}

/// Repository for service transactions and their fee rows.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new transaction in `pending` status. Takes a connection so
    /// the caller can persist the transaction and its fee atomically.
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        new: &NewServiceTransaction,
    ) -> Result<ServiceTransaction, DatabaseError> {
        let sql = format!(
            "INSERT INTO service_transactions \
             (reference, payer_id, provider_id, provider_role, service_kind, service_id, \
              amount_reference, amount_local, currency_code, exchange_rate_used, converted_at, \
              payment_method, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending') \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(&new.reference)
            .bind(&new.payer_id)
            .bind(&new.provider_id)
            .bind(&new.provider_role)
            .bind(&new.service_kind)
            .bind(&new.service_id)
            .bind(&new.amount_reference)
            .bind(&new.amount_local)
            .bind(&new.currency_code)
            .bind(&new.exchange_rate_used)
            .bind(new.converted_at)
            .bind(&new.payment_method)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn insert_fee(
        &self,
        conn: &mut PgConnection,
        new: &NewTransactionFee,
    ) -> Result<TransactionFee, DatabaseError> {
        let sql = format!(
            "INSERT INTO transaction_fees \
             (transaction_id, currency_code, gross_reference, gross_local, commission_rate, \
              commission_reference, commission_local, tax_rate, tax_reference, tax_local, \
              total_fee_reference, total_fee_local, net_reference, net_local, fee_collected) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, FALSE) \
             RETURNING {}",
            FEE_COLUMNS
        );

        sqlx::query_as::<_, TransactionFee>(&sql)
            .bind(new.transaction_id)
            .bind(&new.currency_code)
            .bind(&new.gross_reference)
            .bind(&new.gross_local)
            .bind(&new.commission_rate)
            .bind(&new.commission_reference)
            .bind(&new.commission_local)
            .bind(&new.tax_rate)
            .bind(&new.tax_reference)
            .bind(&new.tax_local)
            .bind(&new.total_fee_reference)
            .bind(&new.total_fee_local)
            .bind(&new.net_reference)
            .bind(&new.net_local)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<ServiceTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM service_transactions WHERE reference = $1",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM service_transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Lock a transaction row for the duration of the caller's transaction.
    pub async fn lock_by_id(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<ServiceTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM service_transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Lock every transaction linked to a gateway transaction.
    pub async fn lock_by_gateway_transaction(
        &self,
        conn: &mut PgConnection,
        gateway_transaction_id: Uuid,
    ) -> Result<Vec<ServiceTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM service_transactions \
             WHERE gateway_transaction_id = $1 \
             ORDER BY created_at ASC \
             FOR UPDATE",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(gateway_transaction_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Link a freshly created gateway transaction and advance to `processing`.
    pub async fn attach_gateway_transaction(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        gateway_transaction_id: Uuid,
    ) -> Result<ServiceTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE service_transactions \
             SET gateway_transaction_id = $2, status = 'processing', updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .bind(gateway_transaction_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Terminal failure outside any transaction (gateway initiation errors).
    pub async fn mark_failed(
        &self,
        id: Uuid,
        failure_code: Option<&str>,
        failure_message: &str,
    ) -> Result<ServiceTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE service_transactions \
             SET status = 'failed', failure_code = $2, failure_message = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .bind(failure_code)
            .bind(failure_message)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Terminal state transition inside the caller's transaction; used by
    /// webhook dispatch for failed/cancelled/refunded outcomes.
    pub async fn mark_terminal(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        status: &str,
        failure_code: Option<&str>,
        failure_message: Option<&str>,
    ) -> Result<ServiceTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE service_transactions \
             SET status = $2, failure_code = $3, failure_message = $4, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .bind(status)
            .bind(failure_code)
            .bind(failure_message)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Completion with the issued invoice number, inside the caller's
    /// transaction so it commits together with the webhook event.
    pub async fn mark_completed(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        invoice_number: &str,
        invoice_sequence: i64,
    ) -> Result<ServiceTransaction, DatabaseError> {
        let sql = format!(
            "UPDATE service_transactions \
             SET status = 'completed', invoice_number = $2, invoice_sequence = $3, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );

        sqlx::query_as::<_, ServiceTransaction>(&sql)
            .bind(id)
            .bind(invoice_number)
            .bind(invoice_sequence)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn fee_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<TransactionFee>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM transaction_fees WHERE transaction_id = $1",
            FEE_COLUMNS
        );

        sqlx::query_as::<_, TransactionFee>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_fee_collected(
        &self,
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<TransactionFee, DatabaseError> {
        let sql = format!(
            "UPDATE transaction_fees \
             SET fee_collected = TRUE, collected_at = NOW() \
             WHERE transaction_id = $1 \
             RETURNING {}",
            FEE_COLUMNS
        );

        sqlx::query_as::<_, TransactionFee>(&sql)
            .bind(transaction_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
