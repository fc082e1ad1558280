use async_trait::async_trait;
use tracing::{error, info};

use crate::database::transaction_repository::ServiceTransaction;

/// Callback boundary toward the (external) notification collaborator.
/// Invoked only after a terminal state has committed.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn notify_payment_completed(&self, transaction: &ServiceTransaction);

    async fn notify_payment_failed(&self, transaction: &ServiceTransaction, reason: &str);
}

/// Default notifier: structured log lines only. The real delivery channel
/// (SMS, push) lives outside the settlement core.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentNotifier for LogNotifier {
    async fn notify_payment_completed(&self, transaction: &ServiceTransaction) {
        info!(
            reference = %transaction.reference,
            payer_id = %transaction.payer_id,
            provider_id = %transaction.provider_id,
            amount = %transaction.amount_local,
            currency = %transaction.currency_code,
            invoice = transaction.invoice_number.as_deref().unwrap_or("-"),
            "payment completed"
        );
    }

    async fn notify_payment_failed(&self, transaction: &ServiceTransaction, reason: &str) {
        error!(
            reference = %transaction.reference,
            payer_id = %transaction.payer_id,
            provider_id = %transaction.provider_id,
            reason = %reason,
            "payment failed"
        );
    }
}
