//! Payment settlement core.
//!
//! Settles payments between a payer and a service provider through an
//! external payment gateway: dual-currency money snapshots, platform
//! commission and tax, split-payment instructions, and exactly-once
//! reconciliation of asynchronous gateway confirmations.
//!
//! The HTTP API layer, receipt rendering and notification delivery live
//! outside this crate; it exposes the collaborator surface as plain async
//! Rust (`create_intent`, `initiate`, `ingest`, `get_payout_summary`,
//! `next_invoice_number`, and the `PaymentNotifier` callbacks).

pub mod config;
pub mod context;
pub mod currency;
pub mod database;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod logging;
pub mod services;
pub mod types;

pub use config::AppConfig;
pub use context::RegionContext;
pub use error::{ErrorCode, SettlementError, SettlementResult};
pub use fees::{DualFeeBreakdown, FeeBreakdown, FeePolicy};
pub use services::{
    CreateIntentRequest, GatewayTransactionAdapter, InitiateRequest, InitiatedPayment,
    InvoiceSequenceService, LogNotifier, PaymentIntent, PaymentIntentManager, PaymentNotifier,
    PayoutHoldManager, PayoutSummary, WebhookOutcome, WebhookProcessor,
};
pub use types::{
    GatewayStatus, MoneySnapshot, PaymentMethod, PayoutSourceKind, PayoutStatus, ProviderRole,
    ServiceKind, TransactionStatus,
};
