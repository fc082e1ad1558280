//! Payment Intent Manager
//!
//! Creates the service transaction and its fee breakdown as one atomic unit,
//! before anything touches the external gateway. The money snapshot and the
//! fee row are immutable after creation; only status and terminal timestamps
//! mutate afterwards, through validated transitions.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::context::RegionContext;
use crate::currency::conversion::CurrencyConversionService;
use crate::database::error::DatabaseError;
use crate::database::transaction_repository::{
    NewServiceTransaction, NewTransactionFee, ServiceTransaction, TransactionFee,
    TransactionRepository,
};
use crate::error::{SettlementError, SettlementResult};
use crate::fees::FeePolicy;
use crate::types::{PaymentMethod, ProviderRole, ServiceKind};

/// Request to create a payment obligation from payer to provider.
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub payer_id: String,
    pub payer_currency: String,
    pub provider_id: String,
    pub provider_role: ProviderRole,
    pub service_kind: ServiceKind,
    pub service_id: String,
    pub gross_reference_amount: BigDecimal,
    pub payment_method: PaymentMethod,
}

/// A persisted intent: the transaction row plus its fee row.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub transaction: ServiceTransaction,
    pub fee: TransactionFee,
}

pub struct PaymentIntentManager {
    pool: PgPool,
    transactions: Arc<TransactionRepository>,
    conversion: Arc<CurrencyConversionService>,
    policy: FeePolicy,
}

impl PaymentIntentManager {
    pub fn new(
        pool: PgPool,
        transactions: Arc<TransactionRepository>,
        conversion: Arc<CurrencyConversionService>,
        policy: FeePolicy,
    ) -> Self {
        Self {
            pool,
            transactions,
            conversion,
            policy,
        }
    }

    /// Create a payment intent: resolve the payer's currency, snapshot the
    /// conversion, compute fees on the reference gross amount, and persist
    /// transaction + fee atomically. Never contacts the gateway.
    pub async fn create_intent(
        &self,
        ctx: &RegionContext,
        request: CreateIntentRequest,
    ) -> SettlementResult<PaymentIntent> {
        self.validate(&request)?;

        let snapshot = self
            .conversion
            .snapshot(ctx, &request.gross_reference_amount, &request.payer_currency)
            .await?;

        let fees = self.policy.compute_dual(
            &request.gross_reference_amount,
            self.conversion.reference_currency(),
            &snapshot.exchange_rate_used,
            &snapshot.currency_code,
            request.service_kind,
            request.provider_role,
        )?;

        let reference = format!("st_{}", Uuid::new_v4().simple());
        let new_transaction = NewServiceTransaction {
            reference: reference.clone(),
            payer_id: request.payer_id.clone(),
            provider_id: request.provider_id.clone(),
            provider_role: request.provider_role.as_str().to_string(),
            service_kind: request.service_kind.as_str().to_string(),
            service_id: request.service_id.clone(),
            amount_reference: snapshot.amount_reference.clone(),
            amount_local: snapshot.amount_local.clone(),
            currency_code: snapshot.currency_code.clone(),
            exchange_rate_used: snapshot.exchange_rate_used.clone(),
            converted_at: snapshot.converted_at,
            payment_method: request.payment_method.as_str().to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let transaction = self.transactions.create(&mut tx, &new_transaction).await?;
        let fee = self
            .transactions
            .insert_fee(
                &mut tx,
                &NewTransactionFee {
                    transaction_id: transaction.id,
                    currency_code: snapshot.currency_code.clone(),
                    gross_reference: fees.reference.gross.clone(),
                    gross_local: fees.local.gross.clone(),
                    commission_rate: fees.reference.commission_rate.clone(),
                    commission_reference: fees.reference.commission.clone(),
                    commission_local: fees.local.commission.clone(),
                    tax_rate: fees.reference.tax_rate.clone(),
                    tax_reference: fees.reference.tax.clone(),
                    tax_local: fees.local.tax.clone(),
                    total_fee_reference: fees.reference.total_fee.clone(),
                    total_fee_local: fees.local.total_fee.clone(),
                    net_reference: fees.reference.net.clone(),
                    net_local: fees.local.net.clone(),
                },
            )
            .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        info!(
            region = %ctx.region,
            reference = %transaction.reference,
            payer_id = %transaction.payer_id,
            provider_id = %transaction.provider_id,
            gross = %snapshot.amount_reference,
            local = %snapshot.amount_local,
            currency = %snapshot.currency_code,
            "payment intent created"
        );

        Ok(PaymentIntent { transaction, fee })
    }

    /// Fetch an intent by its reference.
    pub async fn get_intent(&self, reference: &str) -> SettlementResult<PaymentIntent> {
        let transaction = self
            .transactions
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: reference.to_string(),
            })?;

        let fee = self
            .transactions
            .fee_for_transaction(transaction.id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: reference.to_string(),
            })?;

        Ok(PaymentIntent { transaction, fee })
    }

    fn validate(&self, request: &CreateIntentRequest) -> SettlementResult<()> {
        if request.gross_reference_amount <= BigDecimal::from(0) {
            return Err(SettlementError::Validation {
                message: "gross amount must be positive".to_string(),
                field: Some("gross_reference_amount".to_string()),
            });
        }
        if request.payer_id.trim().is_empty() {
            return Err(SettlementError::Validation {
                message: "payer_id is required".to_string(),
                field: Some("payer_id".to_string()),
            });
        }
        if request.provider_id.trim().is_empty() {
            return Err(SettlementError::Validation {
                message: "provider_id is required".to_string(),
                field: Some("provider_id".to_string()),
            });
        }
        if request.payer_currency.trim().len() != 3 {
            return Err(SettlementError::Validation {
                message: format!("invalid currency code: {}", request.payer_currency),
                field: Some("payer_currency".to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyConfig;
    use crate::database::exchange_rate_repository::ExchangeRateRepository;

    fn manager() -> PaymentIntentManager {
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/test").unwrap();
        let conversion = CurrencyConversionService::new(
            ExchangeRateRepository::new(pool.clone()),
            CurrencyConfig {
                reference_currency: "XOF".to_string(),
                cache_ttl_seconds: 60,
                rate_api_url: "https://open.er-api.com/v6/latest".to_string(),
                rate_api_timeout_secs: 5,
            },
        );
        PaymentIntentManager::new(
            pool.clone(),
            Arc::new(TransactionRepository::new(pool)),
            Arc::new(conversion),
            FeePolicy::default(),
        )
    }

    fn request() -> CreateIntentRequest {
        CreateIntentRequest {
            payer_id: "pat_1".to_string(),
            payer_currency: "XOF".to_string(),
            provider_id: "prov_1".to_string(),
            provider_role: ProviderRole::Doctor,
            service_kind: ServiceKind::Consultation,
            service_id: "cons_99".to_string(),
            gross_reference_amount: BigDecimal::from(10000),
            payment_method: PaymentMethod::MobileMoney,
        }
    }

    #[tokio::test]
    async fn zero_gross_amount_is_rejected() {
        let manager = manager();
        let mut req = request();
        req.gross_reference_amount = BigDecimal::from(0);
        let result = manager.create_intent(&RegionContext::default(), req).await;
        assert!(matches!(
            result,
            Err(SettlementError::Validation { field: Some(f), .. }) if f == "gross_reference_amount"
        ));
    }

    #[tokio::test]
    async fn malformed_currency_is_rejected_before_any_conversion() {
        let manager = manager();
        let mut req = request();
        req.payer_currency = "FRANCS".to_string();
        let result = manager.create_intent(&RegionContext::default(), req).await;
        assert!(matches!(
            result,
            Err(SettlementError::Validation { field: Some(f), .. }) if f == "payer_currency"
        ));
    }

    #[test]
    fn generated_references_are_unique() {
        let a = format!("st_{}", Uuid::new_v4().simple());
        let b = format!("st_{}", Uuid::new_v4().simple());
        assert_ne!(a, b);
        assert!(a.starts_with("st_"));
    }
}
