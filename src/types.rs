//! Core domain enums and the dual-currency money snapshot.
//!
//! Provider roles, payment methods and lifecycle statuses are closed enums
//! with total mappings, so an unknown role or status is a construction-time
//! error instead of a silent fallback.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SettlementError;

/// Role of the service provider being paid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Doctor,
    Hospital,
    Pharmacy,
    Insurer,
}

impl ProviderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderRole::Doctor => "doctor",
            ProviderRole::Hospital => "hospital",
            ProviderRole::Pharmacy => "pharmacy",
            ProviderRole::Insurer => "insurer",
        }
    }

    /// One-letter prefix used when rendering invoice numbers.
    pub fn invoice_prefix(&self) -> char {
        match self {
            ProviderRole::Doctor => 'D',
            ProviderRole::Hospital => 'H',
            ProviderRole::Pharmacy => 'P',
            ProviderRole::Insurer => 'I',
        }
    }

    /// Per-role commission rate override. `None` means the platform default
    /// applies. Insurer settlements carry no platform commission.
    pub fn commission_override(&self) -> Option<BigDecimal> {
        match self {
            ProviderRole::Doctor | ProviderRole::Hospital | ProviderRole::Pharmacy => None,
            ProviderRole::Insurer => Some(BigDecimal::from(0)),
        }
    }
}

impl std::fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderRole {
    type Err = SettlementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "doctor" => Ok(ProviderRole::Doctor),
            "hospital" => Ok(ProviderRole::Hospital),
            "pharmacy" => Ok(ProviderRole::Pharmacy),
            "insurer" => Ok(ProviderRole::Insurer),
            _ => Err(SettlementError::Validation {
                message: format!("unknown provider role: {}", value),
                field: Some("provider_role".to_string()),
            }),
        }
    }
}

/// How the payer settles the transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    MobileMoney,
    OnSiteCash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::OnSiteCash => "on_site_cash",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = SettlementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "mobile_money" | "mobile-money" => Ok(PaymentMethod::MobileMoney),
            "on_site_cash" | "cash" => Ok(PaymentMethod::OnSiteCash),
            _ => Err(SettlementError::Validation {
                message: format!("unknown payment method: {}", value),
                field: Some("payment_method".to_string()),
            }),
        }
    }
}

/// Kind of service being paid for. `WalletTopUp` is fee-exempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Consultation,
    HospitalService,
    PharmacyOrder,
    InsurancePremium,
    WalletTopUp,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Consultation => "consultation",
            ServiceKind::HospitalService => "hospital_service",
            ServiceKind::PharmacyOrder => "pharmacy_order",
            ServiceKind::InsurancePremium => "insurance_premium",
            ServiceKind::WalletTopUp => "wallet_top_up",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = SettlementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "consultation" => Ok(ServiceKind::Consultation),
            "hospital_service" => Ok(ServiceKind::HospitalService),
            "pharmacy_order" => Ok(ServiceKind::PharmacyOrder),
            "insurance_premium" => Ok(ServiceKind::InsurancePremium),
            "wallet_top_up" => Ok(ServiceKind::WalletTopUp),
            _ => Err(SettlementError::Validation {
                message: format!("unknown service kind: {}", value),
                field: Some("service_kind".to_string()),
            }),
        }
    }
}

/// Lifecycle of a service transaction.
///
/// `pending -> processing -> {completed | failed}`, `completed -> refunded`,
/// and any non-terminal state may be cancelled. A failed gateway initiation
/// moves `pending` straight to `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn valid_transitions(&self) -> Vec<TransactionStatus> {
        match self {
            TransactionStatus::Pending => vec![
                TransactionStatus::Processing,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Processing => vec![
                TransactionStatus::Completed,
                TransactionStatus::Failed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Completed => vec![TransactionStatus::Refunded],
            TransactionStatus::Failed
            | TransactionStatus::Cancelled
            | TransactionStatus::Refunded => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Failed
                | TransactionStatus::Cancelled
                | TransactionStatus::Refunded
        )
    }

    pub fn ensure_transition(&self, target: TransactionStatus) -> Result<(), SettlementError> {
        if self.valid_transitions().contains(&target) {
            Ok(())
        } else {
            Err(SettlementError::InvalidTransition {
                from: self.to_db_status().to_string(),
                to: target.to_db_status().to_string(),
            })
        }
    }

    pub fn to_db_status(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "processing" => Some(TransactionStatus::Processing),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" | "canceled" => Some(TransactionStatus::Cancelled),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_status())
    }
}

/// Status mirror of the external gateway transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Pending,
    Approved,
    Declined,
    Refunded,
    Transferred,
    Cancelled,
}

impl GatewayStatus {
    pub fn to_db_status(&self) -> &'static str {
        match self {
            GatewayStatus::Pending => "pending",
            GatewayStatus::Approved => "approved",
            GatewayStatus::Declined => "declined",
            GatewayStatus::Refunded => "refunded",
            GatewayStatus::Transferred => "transferred",
            GatewayStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(GatewayStatus::Pending),
            "approved" => Some(GatewayStatus::Approved),
            "declined" => Some(GatewayStatus::Declined),
            "refunded" => Some(GatewayStatus::Refunded),
            "transferred" => Some(GatewayStatus::Transferred),
            "cancelled" | "canceled" => Some(GatewayStatus::Cancelled),
        _ => None,
        }
    }
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_status())
    }
}

/// Collection state of a platform fee.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Uncollected,
    Collected,
    Waived,
    Disputed,
}

impl FeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Uncollected => "uncollected",
            FeeStatus::Collected => "collected",
            FeeStatus::Waived => "waived",
            FeeStatus::Disputed => "disputed",
        }
    }
}

/// Status of a provider payout schedule. The payout hold is an orthogonal
/// flag, not a status value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Scheduled => "scheduled",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Completed | PayoutStatus::Failed)
    }
}

/// Which record family a payout schedule aggregates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutSourceKind {
    Transaction,
    Consultation,
}

impl PayoutSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutSourceKind::Transaction => "transaction",
            PayoutSourceKind::Consultation => "consultation",
        }
    }
}

/// Dual-currency amount captured at conversion time. Immutable once attached
/// to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneySnapshot {
    pub amount_reference: BigDecimal,
    pub amount_local: BigDecimal,
    pub currency_code: String,
    pub exchange_rate_used: BigDecimal,
    pub converted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            ProviderRole::Doctor,
            ProviderRole::Hospital,
            ProviderRole::Pharmacy,
            ProviderRole::Insurer,
        ] {
            let parsed: ProviderRole = role.as_str().parse().expect("role should parse");
            assert_eq!(parsed, role);
        }
        assert!("astrologer".parse::<ProviderRole>().is_err());
    }

    #[test]
    fn role_prefixes_are_distinct() {
        let prefixes = [
            ProviderRole::Doctor.invoice_prefix(),
            ProviderRole::Hospital.invoice_prefix(),
            ProviderRole::Pharmacy.invoice_prefix(),
            ProviderRole::Insurer.invoice_prefix(),
        ];
        for (i, a) in prefixes.iter().enumerate() {
            for b in prefixes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn transaction_transitions_follow_state_machine() {
        assert!(TransactionStatus::Pending
            .valid_transitions()
            .contains(&TransactionStatus::Processing));
        assert!(TransactionStatus::Pending
            .valid_transitions()
            .contains(&TransactionStatus::Failed));
        assert!(TransactionStatus::Processing
            .valid_transitions()
            .contains(&TransactionStatus::Completed));
        assert!(TransactionStatus::Completed
            .valid_transitions()
            .contains(&TransactionStatus::Refunded));

        // No edges back into the flow.
        assert!(TransactionStatus::Failed.valid_transitions().is_empty());
        assert!(TransactionStatus::Refunded.valid_transitions().is_empty());
        assert!(!TransactionStatus::Pending
            .valid_transitions()
            .contains(&TransactionStatus::Completed));
    }

    #[test]
    fn ensure_transition_rejects_invalid_edges() {
        assert!(TransactionStatus::Pending
            .ensure_transition(TransactionStatus::Processing)
            .is_ok());
        assert!(TransactionStatus::Completed
            .ensure_transition(TransactionStatus::Completed)
            .is_err());
        assert!(TransactionStatus::Failed
            .ensure_transition(TransactionStatus::Processing)
            .is_err());
    }

    #[test]
    fn gateway_status_parses_both_spellings_of_cancelled() {
        assert_eq!(
            GatewayStatus::from_db_status("canceled"),
            Some(GatewayStatus::Cancelled)
        );
        assert_eq!(
            GatewayStatus::from_db_status("cancelled"),
            Some(GatewayStatus::Cancelled)
        );
        assert_eq!(GatewayStatus::from_db_status("settled"), None);
    }

    #[test]
    fn insurer_commission_is_overridden_to_zero() {
        assert_eq!(
            ProviderRole::Insurer.commission_override(),
            Some(BigDecimal::from(0))
        );
        assert_eq!(ProviderRole::Doctor.commission_override(), None);
    }
}
