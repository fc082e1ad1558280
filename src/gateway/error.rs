use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Payment declined: {message}")]
    Declined {
        message: String,
        gateway_code: Option<String>,
    },

    #[error("Webhook verification failed: {message}")]
    WebhookVerification { message: String },

    #[error("Gateway error: {message}")]
    Provider {
        message: String,
        gateway_code: Option<String>,
        retryable: bool,
    },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Validation { .. } => false,
            GatewayError::Declined { .. } => false,
            GatewayError::WebhookVerification { .. } => false,
            GatewayError::Network { .. } => true,
            GatewayError::RateLimit { .. } => true,
            GatewayError::Provider { retryable, .. } => *retryable,
        }
    }

    /// Error code the gateway reported, if any. Recorded on the failed
    /// transaction for audit.
    pub fn gateway_code(&self) -> Option<&str> {
        match self {
            GatewayError::Declined { gateway_code, .. } => gateway_code.as_deref(),
            GatewayError::Provider { gateway_code, .. } => gateway_code.as_deref(),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Validation { message, .. } => message.clone(),
            GatewayError::Network { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            GatewayError::RateLimit { .. } => {
                "Too many requests to the payment gateway. Please retry shortly".to_string()
            }
            GatewayError::Declined { .. } => "Payment was declined by the gateway".to_string(),
            GatewayError::WebhookVerification { .. } => "Invalid webhook signature".to_string(),
            GatewayError::Provider { .. } => "Payment gateway returned an error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(GatewayError::Network {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!GatewayError::Declined {
            message: "declined".to_string(),
            gateway_code: Some("insufficient_funds".to_string())
        }
        .is_retryable());
        assert!(!GatewayError::WebhookVerification {
            message: "bad signature".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn gateway_code_surfaces_from_declines() {
        let err = GatewayError::Declined {
            message: "declined".to_string(),
            gateway_code: Some("card_expired".to_string()),
        };
        assert_eq!(err.gateway_code(), Some("card_expired"));

        let err = GatewayError::Network {
            message: "timeout".to_string(),
        };
        assert_eq!(err.gateway_code(), None);
    }
}
