use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::config::GatewayConfig;
use crate::gateway::client::PaymentGateway;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::{verify_hmac_sha256_hex, GatewayHttpClient};
use crate::gateway::types::{
    CreateTransactionRequest, CustomerProfile, GatewayTransactionHandle, PaymentToken,
    PayoutHandle, PayoutRequest, TransactionSnapshot, WebhookVerification,
};
use crate::types::GatewayStatus;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct FedapayConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for FedapayConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.fedapay.com/v1".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl FedapayConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let secret_key =
            std::env::var("GATEWAY_SECRET_KEY").map_err(|_| GatewayError::Validation {
                message: "GATEWAY_SECRET_KEY environment variable is required".to_string(),
                field: Some("GATEWAY_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            webhook_secret: std::env::var("GATEWAY_WEBHOOK_SECRET").ok(),
            base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.fedapay.com/v1".to_string()),
            timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("GATEWAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            secret_key,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

/// FedaPay-shaped REST gateway client.
pub struct FedapayGateway {
    config: FedapayConfig,
    http: GatewayHttpClient,
}

impl FedapayGateway {
    pub fn new(config: FedapayConfig) -> GatewayResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(FedapayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_status(status: &str) -> GatewayResult<GatewayStatus> {
        GatewayStatus::from_db_status(status).ok_or_else(|| GatewayError::Provider {
            message: format!("unknown gateway transaction status: {}", status),
            gateway_code: None,
            retryable: false,
        })
    }
}

#[async_trait]
impl PaymentGateway for FedapayGateway {
    async fn create_customer(&self, profile: CustomerProfile) -> GatewayResult<i64> {
        if profile.full_name.trim().is_empty() {
            return Err(GatewayError::Validation {
                message: "customer full name is required".to_string(),
                field: Some("full_name".to_string()),
            });
        }

        let payload = serde_json::json!({
            "full_name": profile.full_name,
            "email": profile.email,
            "phone_number": profile.phone,
        });

        let data: FedapayCustomerData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/customers"),
                Some(&self.config.secret_key),
                Some(&payload),
            )
            .await?;

        info!(customer_id = data.id, "gateway customer created");
        Ok(data.id)
    }

    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> GatewayResult<GatewayTransactionHandle> {
        if request.amount_minor <= 0 {
            return Err(GatewayError::Validation {
                message: "amount must be a positive count of minor units".to_string(),
                field: Some("amount_minor".to_string()),
            });
        }

        let payload = serde_json::json!({
            "amount": request.amount_minor,
            "currency": { "iso": request.currency },
            "description": request.description,
            "customer": { "id": request.customer_id },
            "callback_url": request.callback_url,
            "custom_metadata": request.metadata,
        });

        let data: FedapayTransactionData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/transactions"),
                Some(&self.config.secret_key),
                Some(&payload),
            )
            .await?;

        info!(
            gateway_txn_id = data.id,
            reference = %data.reference,
            "gateway transaction created"
        );

        Ok(GatewayTransactionHandle {
            id: data.id,
            reference: data.reference,
        })
    }

    async fn generate_payment_token(&self, transaction_id: i64) -> GatewayResult<PaymentToken> {
        let data: FedapayTokenData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/transactions/{}/token", transaction_id)),
                Some(&self.config.secret_key),
                None,
            )
            .await?;

        Ok(PaymentToken {
            token: data.token,
            url: data.url,
        })
    }

    async fn create_payout(&self, request: PayoutRequest) -> GatewayResult<PayoutHandle> {
        if request.amount_minor <= 0 {
            return Err(GatewayError::Validation {
                message: "payout amount must be a positive count of minor units".to_string(),
                field: Some("amount_minor".to_string()),
            });
        }

        let payload = serde_json::json!({
            "amount": request.amount_minor,
            "currency": { "iso": request.currency },
            "customer": { "id": request.customer_id },
            "mode": request.mode.as_str(),
        });

        let data: FedapayPayoutData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payouts"),
                Some(&self.config.secret_key),
                Some(&payload),
            )
            .await?;

        info!(payout_id = data.id, reference = %data.reference, "gateway payout created");

        Ok(PayoutHandle {
            id: data.id,
            reference: data.reference,
        })
    }

    async fn get_transaction(&self, transaction_id: i64) -> GatewayResult<TransactionSnapshot> {
        let data: FedapayTransactionData = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transactions/{}", transaction_id)),
                Some(&self.config.secret_key),
                None,
            )
            .await?;

        let status = Self::map_status(data.status.as_deref().unwrap_or("pending"))?;

        Ok(TransactionSnapshot {
            id: data.id,
            reference: Some(data.reference),
            status,
            amount_minor: data.amount,
            currency: data.currency.map(|c| c.iso),
            fees: data.fees.map(bigdecimal::BigDecimal::from),
            commission: data.commission.map(bigdecimal::BigDecimal::from),
            last_error_code: data.last_error_code,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> GatewayResult<WebhookVerification> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        let valid = verify_hmac_sha256_hex(payload, secret, signature);
        Ok(WebhookVerification {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid gateway signature".to_string())
            },
        })
    }

    fn name(&self) -> &'static str {
        "fedapay"
    }
}

#[derive(Debug, Deserialize)]
struct FedapayCustomerData {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FedapayTransactionData {
    id: i64,
    reference: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    currency: Option<FedapayCurrency>,
    #[serde(default)]
    fees: Option<i64>,
    #[serde(default)]
    commission: Option<i64>,
    #[serde(default)]
    last_error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FedapayCurrency {
    iso: String,
}

#[derive(Debug, Deserialize)]
struct FedapayTokenData {
    token: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct FedapayPayoutData {
    id: i64,
    reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::http::sign_hmac_sha256_hex;

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
    fn status_mapping_covers_gateway_vocabulary() {
        assert_eq!(
            FedapayGateway::map_status("approved").unwrap(),
            GatewayStatus::Approved
        );
        assert_eq!(
            FedapayGateway::map_status("canceled").unwrap(),
            GatewayStatus::Cancelled
        );
        assert_eq!(
            FedapayGateway::map_status("transferred").unwrap(),
            GatewayStatus::Transferred
        );
        assert!(FedapayGateway::map_status("settled").is_err());
    }

    #[test]
    fn webhook_signature_validation() {
        let gateway = gateway();
        let payload = br#"{"id":"evt_1","type":"transaction.approved"}"#;

        let result = gateway
            .verify_webhook(payload, "invalid_signature")
            .expect("verification should not error");
        assert!(!result.valid);

        let signature = sign_hmac_sha256_hex(payload, "whsec_test");
        let result = gateway
            .verify_webhook(payload, &signature)
            .expect("verification should not error");
        assert!(result.valid);
    }

    #[test]
    fn transaction_payload_parses() {
        let body = r#"{
            "id": 4815,
            "reference": "trx_20260806_0001",
            "status": "approved",
            "amount": 10000,
            "currency": {"iso": "XOF"},
            "fees": 150,
            "commission": 118
        }"#;
        let parsed: FedapayTransactionData = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.id, 4815);
        assert_eq!(parsed.currency.unwrap().iso, "XOF");
    }
}
