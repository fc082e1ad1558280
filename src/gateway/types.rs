use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

use crate::types::GatewayStatus;

/// Customer profile sent to the gateway's create-customer call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Request for the gateway's create-transaction call. The amount is an
/// integer in the currency's minor unit; fractional units are never
/// transmitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub customer_id: i64,
    pub callback_url: String,
    pub metadata: JsonValue,
}

/// Gateway-side identity of a created transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransactionHandle {
    pub id: i64,
    pub reference: String,
}

/// Hosted-payment token and URL for a gateway transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentToken {
    pub token: String,
    pub url: String,
}

/// How a payout reaches the recipient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMode {
    MobileMoney,
    BankTransfer,
}

impl PayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMode::MobileMoney => "mobile_money",
            PayoutMode::BankTransfer => "bank_transfer",
        }
    }
}

/// Request for the gateway's create-payout call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: i64,
    pub mode: PayoutMode,
}

/// Gateway-side identity of a created payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutHandle {
    pub id: i64,
    pub reference: String,
}

/// Point-in-time status snapshot of a gateway transaction.
#[derive(Debug, Clone)]
pub struct TransactionSnapshot {
    pub id: i64,
    pub reference: Option<String>,
    pub status: GatewayStatus,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub fees: Option<BigDecimal>,
    pub commission: Option<BigDecimal>,
    pub last_error_code: Option<String>,
}

/// Result of webhook signature verification.
#[derive(Debug, Clone)]
pub struct WebhookVerification {
    pub valid: bool,
    pub reason: Option<String>,
}

/// How a single gateway transaction's proceeds are divided between the
/// provider and the platform. Embedded in transaction metadata so the
/// gateway can honor the split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitInstructions {
    pub provider_id: String,
    pub provider_amount_minor: i64,
    pub platform_amount_minor: i64,
    pub currency: String,
}

impl SplitInstructions {
    pub fn to_metadata(&self) -> JsonValue {
        serde_json::json!({
            "split": {
                "provider_id": self.provider_id,
                "provider_amount_minor": self.provider_amount_minor,
                "platform_amount_minor": self.platform_amount_minor,
                "currency": self.currency,
            }
        })
    }
}

/// Parsed inbound webhook body: `{ "id": ..., "type": ..., "entity": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub entity: JsonValue,
}

impl WebhookEnvelope {
    /// Gateway entity id (`entity.id`), when present.
    pub fn entity_id(&self) -> Option<i64> {
        self.entity.get("id").and_then(|v| v.as_i64())
    }

    pub fn entity_status(&self) -> Option<&str> {
        self.entity.get("status").and_then(|v| v.as_str())
    }

    pub fn entity_error_code(&self) -> Option<&str> {
        self.entity.get("last_error_code").and_then(|v| v.as_str())
    }

    /// Numeric entity field reported by the gateway (`fees`, `commission`,
    /// `amount_transferred`), tolerant of number or string encodings.
    pub fn entity_decimal(&self, field: &str) -> Option<BigDecimal> {
        let value = self.entity.get(field)?;
        if let Some(n) = value.as_i64() {
            return Some(BigDecimal::from(n));
        }
        if let Some(f) = value.as_f64() {
            return BigDecimal::from_str(&f.to_string()).ok();
        }
        value
            .as_str()
            .and_then(|s| BigDecimal::from_str(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_the_gateway_payload_shape() {
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "transaction.approved",
            "entity": {
                "id": 4815,
                "status": "approved",
                "fees": 150,
                "commission": "118",
                "amount_transferred": 9882,
                "last_error_code": null
            }
        });
        let envelope: WebhookEnvelope = serde_json::from_value(body).unwrap();

        assert_eq!(envelope.id, "evt_1");
        assert_eq!(envelope.event_type, "transaction.approved");
        assert_eq!(envelope.entity_id(), Some(4815));
        assert_eq!(envelope.entity_status(), Some("approved"));
        assert_eq!(envelope.entity_error_code(), None);
        assert_eq!(envelope.entity_decimal("fees"), Some(BigDecimal::from(150)));
        assert_eq!(
            envelope.entity_decimal("commission"),
            Some(BigDecimal::from(118))
        );
    }

    #[test]
    fn split_instructions_embed_into_metadata() {
        let split = SplitInstructions {
            provider_id: "prov_77".to_string(),
            provider_amount_minor: 9882,
            platform_amount_minor: 118,
            currency: "XOF".to_string(),
        };
        let metadata = split.to_metadata();
        assert_eq!(metadata["split"]["provider_amount_minor"], 9882);
        assert_eq!(metadata["split"]["platform_amount_minor"], 118);
        assert_eq!(metadata["split"]["currency"], "XOF");
    }
}
