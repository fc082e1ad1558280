//! Unified error type for the settlement core.
//!
//! Subsystems keep their own error enums (`DatabaseError`, `GatewayError`,
//! `ConversionError`); this module folds them into one `SettlementError` with
//! a stable machine-readable code and a retryability flag so callers can
//! decide whether a failure is worth replaying.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::currency::conversion::ConversionError;
use crate::database::error::DatabaseError;
use crate::fees::FeeError;
use crate::gateway::error::GatewayError;

pub type SettlementResult<T> = Result<T, SettlementError>;

/// Stable error codes for programmatic handling at the API boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "PROVIDER_NOT_PAYABLE")]
    ProviderNotPayable,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "INVALID_STATE_TRANSITION")]
    InvalidStateTransition,
    #[serde(rename = "CURRENCY_UNSUPPORTED")]
    CurrencyUnsupported,
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "WEBHOOK_REJECTED")]
    WebhookRejected,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Provider {provider_id} is not verified and payable")]
    ProviderNotPayable { provider_id: String },

    #[error("Transaction not found: {reference}")]
    TransactionNotFound { reference: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Webhook rejected: {message}")]
    WebhookRejected { message: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SettlementError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SettlementError::Validation { .. } => ErrorCode::ValidationError,
            SettlementError::ProviderNotPayable { .. } => ErrorCode::ProviderNotPayable,
            SettlementError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            SettlementError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            SettlementError::WebhookRejected { .. } => ErrorCode::WebhookRejected,
            SettlementError::Conversion(ConversionError::CurrencyUnsupported { .. }) => {
                ErrorCode::CurrencyUnsupported
            }
            SettlementError::Conversion(_) => ErrorCode::InternalError,
            SettlementError::Fee(_) => ErrorCode::ValidationError,
            SettlementError::Gateway(_) => ErrorCode::GatewayError,
            SettlementError::Database(_) => ErrorCode::DatabaseError,
        }
    }

    /// Whether replaying the same operation could succeed. Validation and
    /// state errors never retry; transport-level failures may.
    pub fn is_retryable(&self) -> bool {
        match self {
            SettlementError::Validation { .. }
            | SettlementError::ProviderNotPayable { .. }
            | SettlementError::InvalidTransition { .. }
            | SettlementError::WebhookRejected { .. } => false,
            SettlementError::TransactionNotFound { .. } => true,
            SettlementError::Conversion(_) => false,
            SettlementError::Fee(_) => false,
            SettlementError::Gateway(e) => e.is_retryable(),
            SettlementError::Database(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = SettlementError::Validation {
            message: "bad".to_string(),
            field: None,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn unsupported_currency_maps_to_its_own_code() {
        let err = SettlementError::Conversion(ConversionError::CurrencyUnsupported {
            from: "XOF".to_string(),
            to: "ZZZ".to_string(),
        });
        assert_eq!(err.code(), ErrorCode::CurrencyUnsupported);
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_gateway_errors_are_retryable() {
        let err = SettlementError::Gateway(GatewayError::Network {
            message: "timeout".to_string(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::GatewayError);
    }
}
