//! Services module for the settlement business logic

pub mod gateway_adapter;
pub mod invoice_sequence;
pub mod notification;
pub mod payment_intent;
pub mod payout_hold;
pub mod webhook_processor;

pub use gateway_adapter::{GatewayTransactionAdapter, InitiateRequest, InitiatedPayment};
pub use invoice_sequence::InvoiceSequenceService;
pub use notification::{LogNotifier, PaymentNotifier};
pub use payment_intent::{CreateIntentRequest, PaymentIntent, PaymentIntentManager};
pub use payout_hold::{PayoutHoldManager, PayoutSummary};
pub use webhook_processor::{WebhookOutcome, WebhookProcessor};
