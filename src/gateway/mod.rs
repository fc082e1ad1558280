//! External payment gateway integration: the `PaymentGateway` trait seam, the
//! concrete HTTP client, and webhook signature verification.

pub mod client;
pub mod error;
pub mod fedapay;
pub mod http;
pub mod types;

pub use client::PaymentGateway;
pub use error::{GatewayError, GatewayResult};
pub use fedapay::{FedapayConfig, FedapayGateway};
pub use types::{
    CreateTransactionRequest, CustomerProfile, GatewayTransactionHandle, PaymentToken,
    PayoutHandle, PayoutMode, PayoutRequest, SplitInstructions, TransactionSnapshot,
    WebhookEnvelope, WebhookVerification,
};
