use caresettle::database::provider_repository::ProviderAccount;
use caresettle::gateway::types::{CreateTransactionRequest, PayoutMode, PayoutRequest};
use caresettle::gateway::{FedapayConfig, FedapayGateway, GatewayError, PaymentGateway};
use chrono::Utc;

fn provider(verified: bool, payable: bool) -> ProviderAccount {
    ProviderAccount {
        provider_id: "prov_1".to_string(),
        role: "doctor".to_string(),
        display_name: "Dr Awa Diop".to_string(),
        payout_currency: "XOF".to_string(),
        verified,
        payable,
        gateway_customer_id: Some(101),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn payable_gate_requires_verification_and_payability() {
    assert!(provider(true, true).is_payable());
    assert!(!provider(false, true).is_payable());
    assert!(!provider(true, false).is_payable());
    assert!(!provider(false, false).is_payable());
}

fn gateway() -> FedapayGateway {
    FedapayGateway::new(FedapayConfig {
        secret_key: "sk_test".to_string(),
        webhook_secret: None,
        base_url: "https://api.fedapay.com/v1".to_string(),
        timeout_secs: 5,
        max_retries: 0,
    })
    .expect("gateway init should succeed")
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_before_any_network_call() {
    let gateway = gateway();

    let result = gateway
        .create_transaction(CreateTransactionRequest {
            amount_minor: 0,
            currency: "XOF".to_string(),
            description: "consultation".to_string(),
            customer_id: 101,
            callback_url: "https://example.com/webhooks".to_string(),
            metadata: serde_json::json!({}),
        })
        .await;
    assert!(matches!(result, Err(GatewayError::Validation { .. })));

    let result = gateway
        .create_payout(PayoutRequest {
            amount_minor: -500,
            currency: "XOF".to_string(),
            customer_id: 101,
            mode: PayoutMode::MobileMoney,
        })
        .await;
    assert!(matches!(result, Err(GatewayError::Validation { .. })));
}

#[tokio::test]
async fn empty_customer_name_is_rejected_before_any_network_call() {
    let gateway = gateway();

    let result = gateway
        .create_customer(caresettle::gateway::CustomerProfile {
            full_name: "  ".to_string(),
            email: None,
            phone: None,
        })
        .await;
    assert!(matches!(result, Err(GatewayError::Validation { .. })));
}
