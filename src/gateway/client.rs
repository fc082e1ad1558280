use async_trait::async_trait;

use crate::gateway::error::GatewayResult;
use crate::gateway::types::{
    CreateTransactionRequest, CustomerProfile, GatewayTransactionHandle, PaymentToken,
    PayoutHandle, PayoutRequest, TransactionSnapshot, WebhookVerification,
};

/// Outbound contract the settlement core consumes from the payment gateway.
///
/// All amounts cross this boundary as integers in the currency's minor unit.
/// Creating a transaction never settles it; settlement is confirmed only by
/// the inbound webhook.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a customer and return the gateway customer id.
    async fn create_customer(&self, profile: CustomerProfile) -> GatewayResult<i64>;

    /// Create a transaction to be paid by the customer.
    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> GatewayResult<GatewayTransactionHandle>;

    /// Generate the hosted-payment token and URL for a transaction.
    async fn generate_payment_token(&self, transaction_id: i64) -> GatewayResult<PaymentToken>;

    /// Create a payout toward a customer.
    async fn create_payout(&self, request: PayoutRequest) -> GatewayResult<PayoutHandle>;

    /// Fetch the current status snapshot of a transaction.
    async fn get_transaction(&self, transaction_id: i64) -> GatewayResult<TransactionSnapshot>;

    /// Verify the signature of an inbound webhook over its raw body.
    fn verify_webhook(&self, payload: &[u8], signature: &str)
        -> GatewayResult<WebhookVerification>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GatewayStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_customer(&self, _profile: CustomerProfile) -> GatewayResult<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(101)
        }

        async fn create_transaction(
            &self,
            _request: CreateTransactionRequest,
        ) -> GatewayResult<GatewayTransactionHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayTransactionHandle {
                id: 4815,
                reference: "gw_ref_1".to_string(),
            })
        }

        async fn generate_payment_token(
            &self,
            transaction_id: i64,
        ) -> GatewayResult<PaymentToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentToken {
                token: format!("tok_{}", transaction_id),
                url: "https://checkout.example.com/tok".to_string(),
            })
        }

        async fn create_payout(&self, _request: PayoutRequest) -> GatewayResult<PayoutHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PayoutHandle {
                id: 92,
                reference: "po_ref_1".to_string(),
            })
        }

        async fn get_transaction(
            &self,
            transaction_id: i64,
        ) -> GatewayResult<TransactionSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransactionSnapshot {
                id: transaction_id,
                reference: Some("gw_ref_1".to_string()),
                status: GatewayStatus::Pending,
                amount_minor: Some(10000),
                currency: Some("XOF".to_string()),
                fees: None,
                commission: None,
                last_error_code: None,
            })
        }

        fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> GatewayResult<WebhookVerification> {
            Ok(WebhookVerification {
                valid: true,
                reason: None,
            })
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_gateway() {
        let gateway: Box<dyn PaymentGateway> = Box::new(MockGateway {
            calls: AtomicUsize::new(0),
        });

        let customer_id = gateway
            .create_customer(CustomerProfile {
                full_name: "Awa Diop".to_string(),
                email: Some("awa@example.com".to_string()),
                phone: None,
            })
            .await
            .expect("customer creation should succeed");
        assert_eq!(customer_id, 101);

        let handle = gateway
            .create_transaction(CreateTransactionRequest {
                amount_minor: 10000,
                currency: "XOF".to_string(),
                description: "Consultation".to_string(),
                customer_id,
                callback_url: "https://example.com/webhooks".to_string(),
                metadata: serde_json::json!({}),
            })
            .await
            .expect("transaction creation should succeed");
        assert_eq!(handle.id, 4815);

        let token = gateway
            .generate_payment_token(handle.id)
            .await
            .expect("token generation should succeed");
        assert_eq!(token.token, "tok_4815");
    }
}
