//! Webhook Ingestion & Idempotency Ledger
//!
//! System of record for gateway confirmations. The gateway delivers at least
//! once; this module applies each event at most once. The event row is
//! created outside the processing transaction (so failures can be recorded
//! after a rollback), then locked with `SELECT ... FOR UPDATE` *before*
//! branching on its processed flag: two racing deliveries serialize on that
//! lock and the loser observes `processed = true`.
//!
//! Dispatch and the processed-flag flip share one transaction: either every
//! related write (gateway status, transaction rows, fee collection, ledger
//! entry, invoice number) commits together or none do, which keeps replays
//! of a failed event safe to repeat.

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::RegionContext;
use crate::database::error::DatabaseError;
use crate::database::fee_ledger_repository::{FeeLedgerRepository, NewFeeLedgerEntry};
use crate::database::gateway_transaction_repository::GatewayTransactionRepository;
use crate::database::payout_repository::PayoutRepository;
use crate::database::transaction_repository::{ServiceTransaction, TransactionRepository};
use crate::database::webhook_repository::WebhookRepository;
use crate::error::{SettlementError, SettlementResult};
use crate::gateway::client::PaymentGateway;
use crate::gateway::types::WebhookEnvelope;
use crate::services::invoice_sequence::InvoiceSequenceService;
use crate::services::notification::PaymentNotifier;
use crate::types::{FeeStatus, GatewayStatus, PayoutStatus, ProviderRole, TransactionStatus};

/// Outcome of handling one webhook delivery. Processing failures are values,
/// not errors: the (excluded) HTTP layer acknowledges every outcome with a
/// success response so the gateway keeps delivering, while failed events
/// stay eligible for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event applied and committed.
    Processed,
    /// Event id seen before and already applied; no side effects.
    AlreadyProcessed,
    /// Dispatch failed; error recorded on the event row, replay allowed.
    Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    TransactionApproved,
    TransactionDeclined,
    TransactionCancelled,
    TransactionRefunded,
    PayoutTransferred,
    PayoutFailed,
    Unknown,
}

pub(crate) fn classify_event(event_type: &str) -> EventKind {
    match event_type {
        "transaction.approved" => EventKind::TransactionApproved,
        "transaction.declined" => EventKind::TransactionDeclined,
        "transaction.canceled" | "transaction.cancelled" => EventKind::TransactionCancelled,
        "transaction.refunded" => EventKind::TransactionRefunded,
        "payout.transferred" => EventKind::PayoutTransferred,
        "payout.failed" => EventKind::PayoutFailed,
        _ => EventKind::Unknown,
    }
}

/// What a dispatched event resolved, plus the notifications to emit after
/// the transaction commits.
#[derive(Default)]
struct AppliedEvent {
    gateway_transaction_id: Option<Uuid>,
    payout_id: Option<Uuid>,
    notifications: Vec<Notification>,
}

enum Notification {
    Completed(ServiceTransaction),
    Failed(ServiceTransaction, String),
}

pub struct WebhookProcessor {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    webhooks: Arc<WebhookRepository>,
    gateway_transactions: Arc<GatewayTransactionRepository>,
    transactions: Arc<TransactionRepository>,
    fee_ledger: Arc<FeeLedgerRepository>,
    payouts: Arc<PayoutRepository>,
    invoices: Arc<InvoiceSequenceService>,
    notifier: Arc<dyn PaymentNotifier>,
}

impl WebhookProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        webhooks: Arc<WebhookRepository>,
        gateway_transactions: Arc<GatewayTransactionRepository>,
        transactions: Arc<TransactionRepository>,
        fee_ledger: Arc<FeeLedgerRepository>,
        payouts: Arc<PayoutRepository>,
        invoices: Arc<InvoiceSequenceService>,
        notifier: Arc<dyn PaymentNotifier>,
    ) -> Self {
        Self {
            pool,
            gateway,
            webhooks,
            gateway_transactions,
            transactions,
            fee_ledger,
            payouts,
            invoices,
            notifier,
        }
    }

    /// Entry point for a raw webhook delivery. The signature is verified
    /// over the raw body before any parsing; unsigned or badly signed
    /// requests are rejected outright.
    pub async fn ingest(
        &self,
        ctx: &RegionContext,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> SettlementResult<WebhookOutcome> {
        let signature = signature.ok_or_else(|| SettlementError::WebhookRejected {
            message: "missing signature header".to_string(),
        })?;

        let verification = self.gateway.verify_webhook(raw_body, signature)?;
        if !verification.valid {
            warn!(
                gateway = self.gateway.name(),
                reason = verification.reason.as_deref().unwrap_or("unknown"),
                "rejected webhook with invalid signature"
            );
            return Err(SettlementError::WebhookRejected {
                message: "invalid signature".to_string(),
            });
        }

        let envelope: WebhookEnvelope =
            serde_json::from_slice(raw_body).map_err(|e| SettlementError::WebhookRejected {
                message: format!("invalid webhook payload: {}", e),
            })?;

        self.handle_event(ctx, &envelope).await
    }

    /// Apply one gateway event exactly once.
    pub async fn handle_event(
        &self,
        ctx: &RegionContext,
        envelope: &WebhookEnvelope,
    ) -> SettlementResult<WebhookOutcome> {
        let payload = serde_json::json!({
            "id": envelope.id,
            "type": envelope.event_type,
            "entity": envelope.entity,
        });

        // The row persists even if dispatch rolls back, so the failure can
        // be recorded on it.
        self.webhooks
            .insert_if_absent(&envelope.id, &envelope.event_type, &payload)
            .await?;

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        let event = self.webhooks.lock_by_event_id(&mut tx, &envelope.id).await?;

        if event.processed {
            info!(event_id = %envelope.id, "webhook event already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        match self.apply(ctx, &mut tx, envelope).await {
            Ok(applied) => {
                self.webhooks
                    .mark_processed(
                        &mut tx,
                        event.id,
                        applied.gateway_transaction_id,
                        applied.payout_id,
                    )
                    .await?;
                tx.commit().await.map_err(DatabaseError::from_sqlx)?;

                for notification in applied.notifications {
                    match notification {
                        Notification::Completed(txn) => {
                            self.notifier.notify_payment_completed(&txn).await;
                        }
                        Notification::Failed(txn, reason) => {
                            self.notifier.notify_payment_failed(&txn, &reason).await;
                        }
                    }
                }

                info!(event_id = %envelope.id, event_type = %envelope.event_type, "webhook event processed");
                Ok(WebhookOutcome::Processed)
            }
            Err(e) => {
                // Roll back the business writes, keep the event row with the
                // error so a later replay of this event id can re-attempt.
                drop(tx);
                if let Err(record_err) = self.webhooks.record_failure(event.id, &e.to_string()).await
                {
                    warn!(event_id = %envelope.id, error = %record_err, "failed to record webhook failure");
                }
                warn!(event_id = %envelope.id, error = %e, "webhook event processing failed");
                Ok(WebhookOutcome::Failed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                })
            }
        }
    }

    /// Replay unprocessed events (manual or scheduled). Each event goes back
    /// through the same exactly-once path.
    pub async fn retry_unprocessed(
        &self,
        ctx: &RegionContext,
        limit: i64,
    ) -> SettlementResult<usize> {
        let pending = self.webhooks.find_unprocessed(limit).await?;

        let mut processed = 0;
        for event in pending {
            let envelope = match serde_json::from_value::<WebhookEnvelope>(event.payload.clone()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(event_id = %event.event_id, error = %e, "stored webhook payload unparseable");
                    continue;
                }
            };

            if let WebhookOutcome::Processed = self.handle_event(ctx, &envelope).await? {
                processed += 1;
            }
        }

        Ok(processed)
    }

    async fn apply(
        &self,
        ctx: &RegionContext,
        conn: &mut PgConnection,
        envelope: &WebhookEnvelope,
    ) -> SettlementResult<AppliedEvent> {
        match classify_event(&envelope.event_type) {
            EventKind::TransactionApproved => self.apply_approved(ctx, conn, envelope).await,
            EventKind::TransactionDeclined => {
                self.apply_transaction_terminal(
                    conn,
                    envelope,
                    GatewayStatus::Declined,
                    TransactionStatus::Failed,
                )
                .await
            }
            EventKind::TransactionCancelled => {
                self.apply_transaction_terminal(
                    conn,
                    envelope,
                    GatewayStatus::Cancelled,
                    TransactionStatus::Cancelled,
                )
                .await
            }
            EventKind::TransactionRefunded => self.apply_refunded(conn, envelope).await,
            EventKind::PayoutTransferred => self.apply_payout(conn, envelope, true).await,
            EventKind::PayoutFailed => self.apply_payout(conn, envelope, false).await,
            EventKind::Unknown => {
                warn!(event_type = %envelope.event_type, "unknown webhook event type, ignoring");
                Ok(AppliedEvent::default())
            }
        }
    }

    async fn apply_approved(
        &self,
        ctx: &RegionContext,
        conn: &mut PgConnection,
        envelope: &WebhookEnvelope,
    ) -> SettlementResult<AppliedEvent> {
        let gateway_txn_id = require_entity_id(envelope)?;

        let gateway_transaction = self
            .gateway_transactions
            .lock_by_gateway_txn_id(conn, gateway_txn_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: format!("gateway transaction {}", gateway_txn_id),
            })?;

        self.gateway_transactions
            .append_payload(conn, gateway_transaction.id, &envelope.entity)
            .await?;

        // Defense in depth: even with a fresh event id, an already-approved
        // gateway transaction is not applied twice.
        if GatewayStatus::from_db_status(&gateway_transaction.status)
            == Some(GatewayStatus::Approved)
        {
            info!(
                gateway_txn_id,
                "gateway transaction already approved, skipping re-apply"
            );
            return Ok(AppliedEvent {
                gateway_transaction_id: Some(gateway_transaction.id),
                ..AppliedEvent::default()
            });
        }

        self.gateway_transactions
            .mark_approved(
                conn,
                gateway_transaction.id,
                envelope.entity_decimal("fees").as_ref(),
                envelope.entity_decimal("commission").as_ref(),
                envelope.entity_decimal("amount_transferred").as_ref(),
            )
            .await?;

        let linked = self
            .transactions
            .lock_by_gateway_transaction(conn, gateway_transaction.id)
            .await?;

        let mut notifications = Vec::new();
        for transaction in linked {
            let current = parse_status(&transaction)?;
            if current == TransactionStatus::Completed {
                continue;
            }
            current.ensure_transition(TransactionStatus::Completed)?;

            let role: ProviderRole = transaction.provider_role.parse()?;
            let (invoice_number, sequence) =
                self.invoices.next_invoice_number(conn, role).await?;
            let receipt_number = self.invoices.next_receipt_number(conn, Utc::now()).await?;

            let completed = self
                .transactions
                .mark_completed(conn, transaction.id, &invoice_number, sequence)
                .await?;
            let fee = self
                .transactions
                .mark_fee_collected(conn, transaction.id)
                .await?;

            self.fee_ledger
                .insert(
                    conn,
                    &NewFeeLedgerEntry {
                        transaction_id: Some(transaction.id),
                        provider_id: completed.provider_id.clone(),
                        provider_role: completed.provider_role.clone(),
                        service_amount: fee.gross_reference.clone(),
                        fee_amount: fee.total_fee_reference.clone(),
                        fee_percent: &fee.commission_rate * bigdecimal::BigDecimal::from(100),
                        status: FeeStatus::Collected.as_str().to_string(),
                        payment_method: completed.payment_method.clone(),
                        collection_method: "gateway_split".to_string(),
                        receipt_number: Some(receipt_number),
                    },
                )
                .await?;

            info!(
                region = %ctx.region,
                reference = %completed.reference,
                invoice = %invoice_number,
                "transaction completed via webhook"
            );
            notifications.push(Notification::Completed(completed));
        }

        Ok(AppliedEvent {
            gateway_transaction_id: Some(gateway_transaction.id),
            payout_id: None,
            notifications,
        })
    }

    async fn apply_transaction_terminal(
        &self,
        conn: &mut PgConnection,
        envelope: &WebhookEnvelope,
        gateway_status: GatewayStatus,
        transaction_status: TransactionStatus,
    ) -> SettlementResult<AppliedEvent> {
        let gateway_txn_id = require_entity_id(envelope)?;

        let gateway_transaction = self
            .gateway_transactions
            .lock_by_gateway_txn_id(conn, gateway_txn_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: format!("gateway transaction {}", gateway_txn_id),
            })?;

        self.gateway_transactions
            .append_payload(conn, gateway_transaction.id, &envelope.entity)
            .await?;

        if GatewayStatus::from_db_status(&gateway_transaction.status) == Some(gateway_status) {
            return Ok(AppliedEvent {
                gateway_transaction_id: Some(gateway_transaction.id),
                ..AppliedEvent::default()
            });
        }

        let error_code = envelope.entity_error_code();
        let error_message = envelope
            .entity
            .get("last_error_message")
            .and_then(JsonValue::as_str);

        self.gateway_transactions
            .mark_status(
                conn,
                gateway_transaction.id,
                gateway_status.to_db_status(),
                error_code,
                error_message,
            )
            .await?;

        let linked = self
            .transactions
            .lock_by_gateway_transaction(conn, gateway_transaction.id)
            .await?;

        let mut notifications = Vec::new();
        for transaction in linked {
            let current = parse_status(&transaction)?;
            if current.is_terminal() {
                continue;
            }
            current.ensure_transition(transaction_status)?;

            let updated = self
                .transactions
                .mark_terminal(
                    conn,
                    transaction.id,
                    transaction_status.to_db_status(),
                    error_code,
                    error_message,
                )
                .await?;

            let reason = error_message
                .or(error_code)
                .unwrap_or(gateway_status.to_db_status())
                .to_string();
            notifications.push(Notification::Failed(updated, reason));
        }

        Ok(AppliedEvent {
            gateway_transaction_id: Some(gateway_transaction.id),
            payout_id: None,
            notifications,
        })
    }

    async fn apply_refunded(
        &self,
        conn: &mut PgConnection,
        envelope: &WebhookEnvelope,
    ) -> SettlementResult<AppliedEvent> {
        let gateway_txn_id = require_entity_id(envelope)?;

        let gateway_transaction = self
            .gateway_transactions
            .lock_by_gateway_txn_id(conn, gateway_txn_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: format!("gateway transaction {}", gateway_txn_id),
            })?;

        self.gateway_transactions
            .append_payload(conn, gateway_transaction.id, &envelope.entity)
            .await?;

        if GatewayStatus::from_db_status(&gateway_transaction.status)
            == Some(GatewayStatus::Refunded)
        {
            return Ok(AppliedEvent {
                gateway_transaction_id: Some(gateway_transaction.id),
                ..AppliedEvent::default()
            });
        }

        self.gateway_transactions
            .mark_status(
                conn,
                gateway_transaction.id,
                GatewayStatus::Refunded.to_db_status(),
                None,
                None,
            )
            .await?;

        let linked = self
            .transactions
            .lock_by_gateway_transaction(conn, gateway_transaction.id)
            .await?;

        for transaction in linked {
            let current = parse_status(&transaction)?;
            if current == TransactionStatus::Refunded {
                continue;
            }
            current.ensure_transition(TransactionStatus::Refunded)?;

            self.transactions
                .mark_terminal(
                    conn,
                    transaction.id,
                    TransactionStatus::Refunded.to_db_status(),
                    None,
                    None,
                )
                .await?;

            // Collected fees are reversed with new negated entries; the
            // original rows are never mutated.
            let entries = self
                .fee_ledger
                .lock_by_transaction(conn, transaction.id)
                .await?;
            for entry in entries {
                if entry.status == FeeStatus::Collected.as_str()
                    && entry.fee_amount > bigdecimal::BigDecimal::from(0)
                {
                    self.fee_ledger
                        .insert(conn, &NewFeeLedgerEntry::reversal_of(&entry))
                        .await?;
                }
            }
        }

        Ok(AppliedEvent {
            gateway_transaction_id: Some(gateway_transaction.id),
            payout_id: None,
            notifications: Vec::new(),
        })
    }

    async fn apply_payout(
        &self,
        conn: &mut PgConnection,
        envelope: &WebhookEnvelope,
        success: bool,
    ) -> SettlementResult<AppliedEvent> {
        let gateway_payout_id = require_entity_id(envelope)?;

        let schedule = self
            .payouts
            .lock_by_gateway_payout_id(conn, gateway_payout_id)
            .await?
            .ok_or_else(|| SettlementError::TransactionNotFound {
                reference: format!("payout {}", gateway_payout_id),
            })?;

        let target = if success {
            PayoutStatus::Completed
        } else {
            PayoutStatus::Failed
        };
        if schedule.status != target.as_str() {
            self.payouts
                .update_status(conn, schedule.id, target.as_str())
                .await?;
        }

        Ok(AppliedEvent {
            gateway_transaction_id: None,
            payout_id: Some(schedule.id),
            notifications: Vec::new(),
        })
    }
}

fn require_entity_id(envelope: &WebhookEnvelope) -> SettlementResult<i64> {
    envelope
        .entity_id()
        .ok_or_else(|| SettlementError::Validation {
            message: format!("{} event is missing entity.id", envelope.event_type),
            field: Some("entity.id".to_string()),
        })
}

fn parse_status(transaction: &ServiceTransaction) -> SettlementResult<TransactionStatus> {
    TransactionStatus::from_db_status(&transaction.status).ok_or_else(|| {
        SettlementError::Validation {
            message: format!(
                "transaction {} has unknown status: {}",
                transaction.reference, transaction.status
            ),
            field: Some("status".to_string()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_classify_to_their_handlers() {
        assert_eq!(
            classify_event("transaction.approved"),
            EventKind::TransactionApproved
        );
        assert_eq!(
            classify_event("transaction.declined"),
            EventKind::TransactionDeclined
        );
        assert_eq!(
            classify_event("transaction.canceled"),
            EventKind::TransactionCancelled
        );
        assert_eq!(
            classify_event("transaction.refunded"),
            EventKind::TransactionRefunded
        );
        assert_eq!(
            classify_event("payout.transferred"),
            EventKind::PayoutTransferred
        );
        assert_eq!(classify_event("payout.failed"), EventKind::PayoutFailed);
        assert_eq!(classify_event("customer.updated"), EventKind::Unknown);
    }

    #[test]
    fn missing_entity_id_is_a_validation_error() {
        let envelope = WebhookEnvelope {
            id: "evt_1".to_string(),
            event_type: "transaction.approved".to_string(),
            entity: serde_json::json!({ "status": "approved" }),
        };
        assert!(matches!(
            require_entity_id(&envelope),
            Err(SettlementError::Validation { .. })
        ));
    }

    #[test]
    fn failed_outcome_carries_retryability() {
        let outcome = WebhookOutcome::Failed {
            error: "db down".to_string(),
            retryable: true,
        };
        assert!(matches!(
            outcome,
            WebhookOutcome::Failed { retryable: true, .. }
        ));
        assert_ne!(outcome, WebhookOutcome::Processed);
    }
}
