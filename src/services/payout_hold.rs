//! Fee Ledger & Payout Hold Manager
//!
//! Provider payouts are held while the provider lacks platform verification.
//! Releasing is idempotent and only possible once the provider is verified
//! and payable again. Disbursement goes out through the gateway; the payout
//! webhook is what completes a schedule.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::context::RegionContext;
use crate::currency;
use crate::database::error::DatabaseError;
use crate::database::payout_repository::{NewPayoutSchedule, PayoutRepository, PayoutSchedule};
use crate::database::provider_repository::ProviderRepository;
use crate::error::{SettlementError, SettlementResult};
use crate::gateway::client::PaymentGateway;
use crate::gateway::types::{PayoutMode, PayoutRequest};
use crate::services::gateway_adapter::ensure_payable;
use crate::types::{PayoutSourceKind, PayoutStatus};

/// Aggregated payout view for a provider, spanning per-transaction and
/// per-consultation payout records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub provider_id: String,
    pub on_hold_count: i64,
    pub on_hold_total: BigDecimal,
    pub pending_total: BigDecimal,
    pub completed_total: BigDecimal,
}

pub struct PayoutHoldManager {
    pool: PgPool,
    payouts: Arc<PayoutRepository>,
    providers: Arc<ProviderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PayoutHoldManager {
    pub fn new(
        pool: PgPool,
        payouts: Arc<PayoutRepository>,
        providers: Arc<ProviderRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            pool,
            payouts,
            providers,
            gateway,
        }
    }

    /// Schedule a payout for a provider over a period. Created on hold when
    /// the provider is not verified-and-payable, so an unverified provider
    /// never has a releasable pending payout.
    pub async fn schedule_payout(
        &self,
        ctx: &RegionContext,
        provider_id: &str,
        source_kind: PayoutSourceKind,
        period_start: NaiveDate,
        period_end: NaiveDate,
        gross_amount: BigDecimal,
        fees_deducted: BigDecimal,
        currency_code: &str,
    ) -> SettlementResult<PayoutSchedule> {
        let provider = self.require_provider(provider_id).await?;
        let net_amount = &gross_amount - &fees_deducted;

        let on_hold = !provider.is_payable();
        let schedule = self
            .payouts
            .insert(&NewPayoutSchedule {
                provider_id: provider_id.to_string(),
                source_kind: source_kind.as_str().to_string(),
                period_start,
                period_end,
                gross_amount,
                fees_deducted,
                net_amount,
                currency_code: currency_code.to_uppercase(),
                on_hold,
                on_hold_reason: on_hold.then(|| "provider_not_verified".to_string()),
            })
            .await?;

        info!(
            region = %ctx.region,
            provider_id,
            schedule_id = %schedule.id,
            on_hold,
            net = %schedule.net_amount,
            "payout scheduled"
        );
        Ok(schedule)
    }

    /// Place all of a provider's open payouts on hold.
    pub async fn hold_payouts(
        &self,
        ctx: &RegionContext,
        provider_id: &str,
        reason: &str,
    ) -> SettlementResult<u64> {
        let held = self.payouts.hold_all(provider_id, reason).await?;
        info!(region = %ctx.region, provider_id, held, reason, "payouts placed on hold");
        Ok(held)
    }

    /// Release all held payouts once the provider is verified. Idempotent:
    /// repeated calls release zero further rows.
    pub async fn release_held_payouts(
        &self,
        ctx: &RegionContext,
        provider_id: &str,
    ) -> SettlementResult<u64> {
        let provider = self.require_provider(provider_id).await?;
        ensure_payable(&provider)?;

        let released = self.payouts.release_all(provider_id).await?;
        info!(region = %ctx.region, provider_id, released, "held payouts released");
        Ok(released)
    }

    /// Aggregate on-hold / pending / completed totals for a provider.
    pub async fn get_payout_summary(
        &self,
        _ctx: &RegionContext,
        provider_id: &str,
    ) -> SettlementResult<PayoutSummary> {
        let totals = self.payouts.totals_for_provider(provider_id).await?;
        let zero = BigDecimal::from(0);

        Ok(PayoutSummary {
            provider_id: provider_id.to_string(),
            on_hold_count: totals.on_hold_count,
            on_hold_total: totals.on_hold_total.unwrap_or_else(|| zero.clone()),
            pending_total: totals.pending_total.unwrap_or_else(|| zero.clone()),
            completed_total: totals.completed_total.unwrap_or(zero),
        })
    }

    /// Send a scheduled payout to the gateway. Held schedules and
    /// unverified providers are rejected before any outbound call; the
    /// payout webhook later completes or fails the schedule.
    pub async fn disburse(
        &self,
        ctx: &RegionContext,
        schedule_id: Uuid,
        mode: PayoutMode,
    ) -> SettlementResult<PayoutSchedule> {
        let schedule = self
            .payouts
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: format!("payout schedule {}", schedule_id),
            })?;

        if schedule.on_hold {
            return Err(SettlementError::Validation {
                message: format!(
                    "payout {} is on hold: {}",
                    schedule_id,
                    schedule.on_hold_reason.as_deref().unwrap_or("unspecified")
                ),
                field: Some("on_hold".to_string()),
            });
        }
        if schedule.status != PayoutStatus::Scheduled.as_str() {
            return Err(SettlementError::InvalidTransition {
                from: schedule.status.clone(),
                to: PayoutStatus::Processing.as_str().to_string(),
            });
        }

        let provider = self.require_provider(&schedule.provider_id).await?;
        ensure_payable(&provider)?;

        let customer_id =
            provider
                .gateway_customer_id
                .ok_or_else(|| SettlementError::Validation {
                    message: format!(
                        "provider {} has no gateway customer id",
                        schedule.provider_id
                    ),
                    field: Some("gateway_customer_id".to_string()),
                })?;

        let handle = self
            .gateway
            .create_payout(PayoutRequest {
                amount_minor: currency::to_minor_units(
                    &schedule.net_amount,
                    &schedule.currency_code,
                )?,
                currency: schedule.currency_code.clone(),
                customer_id,
                mode,
            })
            .await?;

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        let updated = self
            .payouts
            .mark_processing(&mut tx, schedule.id, handle.id)
            .await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        info!(
            region = %ctx.region,
            schedule_id = %schedule.id,
            gateway_payout_id = handle.id,
            "payout disbursement initiated"
        );
        Ok(updated)
    }

    async fn require_provider(
        &self,
        provider_id: &str,
    ) -> SettlementResult<crate::database::provider_repository::ProviderAccount> {
        self.providers
            .find(provider_id)
            .await?
            .ok_or_else(|| SettlementError::Validation {
                message: format!("unknown provider: {}", provider_id),
                field: Some("provider_id".to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_defaults_missing_totals_to_zero() {
        let totals = crate::database::payout_repository::PayoutTotals {
            on_hold_count: 0,
            on_hold_total: None,
            pending_total: None,
            completed_total: Some(BigDecimal::from(5000)),
        };
        let zero = BigDecimal::from(0);
        assert_eq!(totals.on_hold_total.unwrap_or_else(|| zero.clone()), zero);
        assert_eq!(totals.completed_total.unwrap(), BigDecimal::from(5000));
    }
}
