//! Gateway Transaction Adapter
//!
//! Maps a pending payment intent onto an external gateway transaction:
//! embeds the split-payment instructions, creates the transaction and its
//! hosted-payment token, links the mirror row and advances the intent to
//! `processing`. A gateway failure (including timeout) is fatal to the
//! intent; the caller creates a fresh intent to retry. Settlement itself is
//! only ever confirmed by the inbound webhook.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use crate::context::RegionContext;
use crate::currency;
use crate::database::error::DatabaseError;
use crate::database::gateway_transaction_repository::{
    GatewayTransaction, GatewayTransactionRepository, NewGatewayTransaction,
};
use crate::database::provider_repository::{ProviderAccount, ProviderRepository};
use crate::database::transaction_repository::{
    ServiceTransaction, TransactionFee, TransactionRepository,
};
use crate::error::{SettlementError, SettlementResult};
use crate::gateway::client::PaymentGateway;
use crate::gateway::types::{
    CreateTransactionRequest, CustomerProfile, PaymentToken, SplitInstructions,
};
use crate::types::TransactionStatus;

/// Request to take a pending intent to the gateway.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub transaction_reference: String,
    pub payer: CustomerProfile,
    pub description: Option<String>,
}

/// Result of a successful initiation: the linked mirror row plus the hosted
/// payment URL the payer is redirected to.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub gateway_transaction: GatewayTransaction,
    pub payment_token: String,
    pub payment_url: String,
}

pub struct GatewayTransactionAdapter {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    transactions: Arc<TransactionRepository>,
    gateway_transactions: Arc<GatewayTransactionRepository>,
    providers: Arc<ProviderRepository>,
    callback_url: String,
}

impl GatewayTransactionAdapter {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        transactions: Arc<TransactionRepository>,
        gateway_transactions: Arc<GatewayTransactionRepository>,
        providers: Arc<ProviderRepository>,
        callback_url: String,
    ) -> Self {
        Self {
            pool,
            gateway,
            transactions,
            gateway_transactions,
            providers,
            callback_url,
        }
    }

    /// Initiate the gateway payment for a pending intent.
    pub async fn initiate(
        &self,
        ctx: &RegionContext,
        request: InitiateRequest,
    ) -> SettlementResult<InitiatedPayment> {
        let transaction = self
            .transactions
            .find_by_reference(&request.transaction_reference)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: request.transaction_reference.clone(),
            })?;

        let current = TransactionStatus::from_db_status(&transaction.status).ok_or_else(|| {
            SettlementError::Validation {
                message: format!("transaction has unknown status: {}", transaction.status),
                field: Some("status".to_string()),
            }
        })?;
        current.ensure_transition(TransactionStatus::Processing)?;

        let fee = self
            .transactions
            .fee_for_transaction(transaction.id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: request.transaction_reference.clone(),
            })?;

        let provider = self
            .providers
            .find(&transaction.provider_id)
            .await?
            .ok_or_else(|| SettlementError::Validation {
                message: format!("unknown provider: {}", transaction.provider_id),
                field: Some("provider_id".to_string()),
            })?;

        // Unverified providers are rejected before any outbound call.
        ensure_payable(&provider)?;

        match self
            .call_gateway(ctx, &transaction, &fee, &provider, &request)
            .await
        {
            Ok((new_row, token)) => {
                let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
                let gateway_transaction =
                    self.gateway_transactions.create(&mut tx, &new_row).await?;
                self.transactions
                    .attach_gateway_transaction(&mut tx, transaction.id, gateway_transaction.id)
                    .await?;
                tx.commit().await.map_err(DatabaseError::from_sqlx)?;

                info!(
                    region = %ctx.region,
                    reference = %transaction.reference,
                    gateway_txn_id = ?gateway_transaction.gateway_txn_id,
                    "gateway payment initiated"
                );

                Ok(InitiatedPayment {
                    gateway_transaction,
                    payment_token: token.token,
                    payment_url: token.url,
                })
            }
            Err(e) => {
                // Fatal branch: the intent is dead, a retry needs a new one.
                error!(
                    reference = %transaction.reference,
                    error = %e,
                    "gateway initiation failed, marking transaction failed"
                );
                self.transactions
                    .mark_failed(transaction.id, e.gateway_code(), &e.to_string())
                    .await?;
                Err(e.into())
            }
        }
    }

    /// Fetch the gateway's current view of a transaction. Informational
    /// only: status polling never drives settlement, the webhook does.
    pub async fn fetch_gateway_snapshot(
        &self,
        gateway_txn_id: i64,
    ) -> SettlementResult<crate::gateway::types::TransactionSnapshot> {
        let snapshot = self.gateway.get_transaction(gateway_txn_id).await?;
        Ok(snapshot)
    }

    async fn call_gateway(
        &self,
        ctx: &RegionContext,
        transaction: &ServiceTransaction,
        fee: &TransactionFee,
        provider: &ProviderAccount,
        request: &InitiateRequest,
    ) -> Result<(NewGatewayTransaction, PaymentToken), crate::gateway::error::GatewayError> {
        let customer_id = self.gateway.create_customer(request.payer.clone()).await?;

        let split = SplitInstructions {
            provider_id: provider.provider_id.clone(),
            provider_amount_minor: currency::to_minor_units(
                &fee.net_local,
                &transaction.currency_code,
            )
            .map_err(|e| crate::gateway::error::GatewayError::Validation {
                message: e.to_string(),
                field: Some("net_local".to_string()),
            })?,
            platform_amount_minor: currency::to_minor_units(
                &fee.total_fee_local,
                &transaction.currency_code,
            )
            .map_err(|e| crate::gateway::error::GatewayError::Validation {
                message: e.to_string(),
                field: Some("total_fee_local".to_string()),
            })?,
            currency: transaction.currency_code.clone(),
        };

        let amount_minor =
            currency::to_minor_units(&transaction.amount_local, &transaction.currency_code)
                .map_err(|e| crate::gateway::error::GatewayError::Validation {
                    message: e.to_string(),
                    field: Some("amount_local".to_string()),
                })?;

        let mut metadata = split.to_metadata();
        metadata["transaction_reference"] = serde_json::json!(transaction.reference);
        metadata["region"] = serde_json::json!(ctx.region);

        let description = request.description.clone().unwrap_or_else(|| {
            format!("{} {}", transaction.service_kind, transaction.service_id)
        });

        let handle = self
            .gateway
            .create_transaction(CreateTransactionRequest {
                amount_minor,
                currency: transaction.currency_code.clone(),
                description,
                customer_id,
                callback_url: self.callback_url.clone(),
                metadata,
            })
            .await?;

        let token = self.gateway.generate_payment_token(handle.id).await?;

        Ok((
            NewGatewayTransaction {
                gateway_provider: self.gateway.name().to_string(),
                gateway_txn_id: handle.id,
                gateway_reference: handle.reference,
                amount_reference: transaction.amount_reference.clone(),
                amount_local: transaction.amount_local.clone(),
                currency_code: transaction.currency_code.clone(),
                exchange_rate_used: transaction.exchange_rate_used.clone(),
                converted_at: transaction.converted_at,
            },
            token,
        ))
    }
}

/// Gate every provider-directed gateway action on the verified-and-payable
/// flag.
pub(crate) fn ensure_payable(provider: &ProviderAccount) -> Result<(), SettlementError> {
    if provider.is_payable() {
        Ok(())
    } else {
        Err(SettlementError::ProviderNotPayable {
            provider_id: provider.provider_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn provider(verified: bool, payable: bool) -> ProviderAccount {
        ProviderAccount {
            provider_id: "prov_1".to_string(),
            role: "doctor".to_string(),
            display_name: "Dr Awa Diop".to_string(),
            payout_currency: "XOF".to_string(),
            verified,
            payable,
            gateway_customer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unverified_provider_is_rejected() {
        let result = ensure_payable(&provider(false, true));
        assert!(matches!(
            result,
            Err(SettlementError::ProviderNotPayable { provider_id }) if provider_id == "prov_1"
        ));
    }

    #[test]
    fn verified_and_payable_provider_passes() {
        assert!(ensure_payable(&provider(true, true)).is_ok());
        assert!(ensure_payable(&provider(true, false)).is_err());
    }
}
