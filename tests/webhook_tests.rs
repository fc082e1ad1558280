use caresettle::gateway::http::{sign_hmac_sha256_hex, verify_hmac_sha256_hex};
use caresettle::gateway::types::WebhookEnvelope;
use caresettle::gateway::{FedapayConfig, FedapayGateway, PaymentGateway};
use caresettle::WebhookOutcome;
use serde_json::json;

fn gateway() -> FedapayGateway {
    FedapayGateway::new(FedapayConfig {
        secret_key: "sk_test".to_string(),
        webhook_secret: Some("whsec_test".to_string()),
        base_url: "https://api.fedapay.com/v1".to_string(),
        timeout_secs: 5,
        max_retries: 1,
    })
    .expect("gateway init should succeed")
}

#[test]
fn signature_is_checked_over_the_raw_body() {
    let gateway = gateway();
    let body = br#"{"id":"evt_1","type":"transaction.approved","entity":{"id":4815}}"#;

    let signature = sign_hmac_sha256_hex(body, "whsec_test");
    assert!(gateway.verify_webhook(body, &signature).unwrap().valid);

    // Any change to the raw body invalidates the signature.
    let tampered = br#"{"id":"evt_1","type":"transaction.approved","entity":{"id":9999}}"#;
    assert!(!gateway.verify_webhook(tampered, &signature).unwrap().valid);

    // A signature computed with the wrong secret is rejected.
    let forged = sign_hmac_sha256_hex(body, "attacker_secret");
    assert!(!gateway.verify_webhook(body, &forged).unwrap().valid);
}

#[test]
fn envelope_parses_approved_event_payloads() {
    let body = json!({
        "id": "evt_1",
        "type": "transaction.approved",
        "entity": {
            "id": 4815,
            "status": "approved",
            "fees": 150,
            "commission": 118,
            "amount_transferred": 9882,
            "last_error_code": null
        }
    });

    let envelope: WebhookEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.id, "evt_1");
    assert_eq!(envelope.event_type, "transaction.approved");
    assert_eq!(envelope.entity_id(), Some(4815));
    assert_eq!(envelope.entity_status(), Some("approved"));
}

#[test]
fn envelope_surfaces_gateway_error_codes_on_declines() {
    let body = json!({
        "id": "evt_2",
        "type": "transaction.declined",
        "entity": {
            "id": 4816,
            "status": "declined",
            "last_error_code": "insufficient_funds",
            "last_error_message": "Solde insuffisant"
        }
    });

    let envelope: WebhookEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(envelope.entity_error_code(), Some("insufficient_funds"));
}

#[test]
fn duplicate_deliveries_share_one_event_identity() {
    // Two deliveries of the same gateway event carry the same event id; the
    // idempotency ledger keys on it, so the second delivery resolves to the
    // same row as the first.
    let first: WebhookEnvelope = serde_json::from_value(json!({
        "id": "evt_1",
        "type": "transaction.approved",
        "entity": { "id": 4815, "status": "approved" }
    }))
    .unwrap();
    let second: WebhookEnvelope = serde_json::from_value(json!({
        "id": "evt_1",
        "type": "transaction.approved",
        "entity": { "id": 4815, "status": "approved" }
    }))
    .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.entity_id(), second.entity_id());
}

#[test]
fn outcomes_distinguish_duplicates_from_failures() {
    assert_eq!(WebhookOutcome::Processed, WebhookOutcome::Processed);
    assert_eq!(
        WebhookOutcome::AlreadyProcessed,
        WebhookOutcome::AlreadyProcessed
    );
    assert_ne!(WebhookOutcome::Processed, WebhookOutcome::AlreadyProcessed);

    let failed = WebhookOutcome::Failed {
        error: "gateway transaction 4815 not found".to_string(),
        retryable: true,
    };
    assert!(matches!(
        failed,
        WebhookOutcome::Failed { retryable: true, .. }
    ));
}

#[test]
fn payload_without_signature_material_cannot_be_verified() {
    let body = br#"{"id":"evt_3","type":"transaction.refunded","entity":{"id":4817}}"#;
    assert!(!verify_hmac_sha256_hex(body, "whsec_test", ""));
    assert!(!verify_hmac_sha256_hex(body, "whsec_test", "not-hex"));
}
