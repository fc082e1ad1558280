//! Fee Calculation Engine
//!
//! Pure computation of platform commission and tax for a gross amount.
//! Commission applies to the gross amount; tax applies to the commission,
//! not to the gross. Exempt transaction kinds (inbound top-ups) bypass fee
//! computation entirely. When both currencies are needed, the reference leg
//! is computed first and the local leg is converted from it, so the two legs
//! never disagree by more than rounding.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::FeesConfig;
use crate::currency;
use crate::types::{ProviderRole, ServiceKind};

#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Platform fee policy: commission rate, tax-on-commission rate, and the set
/// of fee-exempt transaction kinds.
#[derive(Debug, Clone)]
pub struct FeePolicy {
    pub commission_rate: BigDecimal,
    pub tax_rate: BigDecimal,
    pub exempt_kinds: Vec<ServiceKind>,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            commission_rate: BigDecimal::from_str("0.01").unwrap(),
            tax_rate: BigDecimal::from_str("0.18").unwrap(),
            exempt_kinds: vec![ServiceKind::WalletTopUp],
        }
    }
}

/// Fee breakdown for one currency leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub currency: String,
    pub gross: BigDecimal,
    pub commission_rate: BigDecimal,
    pub commission: BigDecimal,
    pub tax_rate: BigDecimal,
    pub tax: BigDecimal,
    pub total_fee: BigDecimal,
    pub net: BigDecimal,
    pub exempt: bool,
}

/// Fee breakdown in both the reference and the payer's local currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualFeeBreakdown {
    pub reference: FeeBreakdown,
    pub local: FeeBreakdown,
}

impl FeePolicy {
    pub fn from_config(config: &FeesConfig) -> Self {
        Self {
            commission_rate: config.commission_rate.clone(),
            tax_rate: config.tax_rate.clone(),
            exempt_kinds: vec![ServiceKind::WalletTopUp],
        }
    }

    fn effective_commission_rate(&self, role: ProviderRole) -> BigDecimal {
        role.commission_override()
            .unwrap_or_else(|| self.commission_rate.clone())
    }

    /// Compute the fee breakdown for a gross amount in a single currency.
    pub fn compute(
        &self,
        gross: &BigDecimal,
        currency_code: &str,
        kind: ServiceKind,
        role: ProviderRole,
    ) -> Result<FeeBreakdown, FeeError> {
        if gross < &BigDecimal::from(0) {
            return Err(FeeError::InvalidAmount(format!(
                "gross amount must not be negative: {}",
                gross
            )));
        }

        let zero = BigDecimal::from(0);
        if self.exempt_kinds.contains(&kind) {
            return Ok(FeeBreakdown {
                currency: currency_code.to_uppercase(),
                gross: gross.clone(),
                commission_rate: zero.clone(),
                commission: zero.clone(),
                tax_rate: zero.clone(),
                tax: zero.clone(),
                total_fee: zero,
                net: gross.clone(),
                exempt: true,
            });
        }

        let commission_rate = self.effective_commission_rate(role);
        let commission = currency::round_amount(&(gross * &commission_rate), currency_code);
        let tax = currency::round_amount(&(&commission * &self.tax_rate), currency_code);
        let total_fee = &commission + &tax;
        let net = gross - &total_fee;

        Ok(FeeBreakdown {
            currency: currency_code.to_uppercase(),
            gross: gross.clone(),
            commission_rate,
            commission,
            tax_rate: self.tax_rate.clone(),
            tax,
            total_fee,
            net,
            exempt: false,
        })
    }

    /// Derive the local-currency leg from an already computed reference leg.
    ///
    /// Commission and tax are converted (not recomputed), then total and net
    /// are derived arithmetically so each leg's internal invariants hold
    /// exactly.
    pub fn convert_leg(
        &self,
        reference: &FeeBreakdown,
        rate: &BigDecimal,
        local_currency: &str,
    ) -> FeeBreakdown {
        let gross = currency::round_amount(&(&reference.gross * rate), local_currency);
        let commission = currency::round_amount(&(&reference.commission * rate), local_currency);
        let tax = currency::round_amount(&(&reference.tax * rate), local_currency);
        let total_fee = &commission + &tax;
        let net = &gross - &total_fee;

        FeeBreakdown {
            currency: local_currency.to_uppercase(),
            gross,
            commission_rate: reference.commission_rate.clone(),
            commission,
            tax_rate: reference.tax_rate.clone(),
            tax,
            total_fee,
            net,
            exempt: reference.exempt,
        }
    }

    /// Compute both currency legs for a reference-currency gross amount.
    pub fn compute_dual(
        &self,
        gross_reference: &BigDecimal,
        reference_currency: &str,
        rate: &BigDecimal,
        local_currency: &str,
        kind: ServiceKind,
        role: ProviderRole,
    ) -> Result<DualFeeBreakdown, FeeError> {
        let reference = self.compute(gross_reference, reference_currency, kind, role)?;
        let local = self.convert_leg(&reference, rate, local_currency);
        Ok(DualFeeBreakdown { reference, local })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FeePolicy {
        FeePolicy::default()
    }

    #[test]
    fn commission_and_tax_for_ten_thousand_reference_units() {
        let breakdown = policy()
            .compute(
                &BigDecimal::from(10000),
                "XOF",
                ServiceKind::Consultation,
                ProviderRole::Doctor,
            )
            .unwrap();

        assert_eq!(breakdown.commission, BigDecimal::from(100));
        assert_eq!(breakdown.tax, BigDecimal::from(18));
        assert_eq!(breakdown.total_fee, BigDecimal::from(118));
        assert_eq!(breakdown.net, BigDecimal::from(9882));
        assert!(!breakdown.exempt);
    }

    #[test]
    fn total_is_commission_plus_tax_and_net_balances() {
        let policy = policy();
        for gross in [1_u32, 7, 99, 1000, 10_001, 250_000] {
            let breakdown = policy
                .compute(
                    &BigDecimal::from(gross),
                    "XOF",
                    ServiceKind::Consultation,
                    ProviderRole::Hospital,
                )
                .unwrap();
            assert_eq!(
                breakdown.total_fee,
                &breakdown.commission + &breakdown.tax
            );
            assert_eq!(
                &breakdown.net + &breakdown.total_fee,
                BigDecimal::from(gross)
            );
        }
    }

    #[test]
    fn top_ups_are_fee_exempt() {
        let breakdown = policy()
            .compute(
                &BigDecimal::from(5000),
                "XOF",
                ServiceKind::WalletTopUp,
                ProviderRole::Doctor,
            )
            .unwrap();

        assert!(breakdown.exempt);
        assert_eq!(breakdown.total_fee, BigDecimal::from(0));
        assert_eq!(breakdown.net, BigDecimal::from(5000));
    }

    #[test]
    fn insurer_role_override_zeroes_commission() {
        let breakdown = policy()
            .compute(
                &BigDecimal::from(10000),
                "XOF",
                ServiceKind::InsurancePremium,
                ProviderRole::Insurer,
            )
            .unwrap();

        assert_eq!(breakdown.commission, BigDecimal::from(0));
        assert_eq!(breakdown.tax, BigDecimal::from(0));
        assert_eq!(breakdown.net, BigDecimal::from(10000));
        assert!(!breakdown.exempt);
    }

    #[test]
    fn negative_gross_is_rejected() {
        let result = policy().compute(
            &BigDecimal::from(-100),
            "XOF",
            ServiceKind::Consultation,
            ProviderRole::Doctor,
        );
        assert!(matches!(result, Err(FeeError::InvalidAmount(_))));
    }

    #[test]
    fn local_leg_is_converted_not_recomputed() {
        let policy = policy();
        let rate = BigDecimal::from_str("0.00152449").unwrap();
        let dual = policy
            .compute_dual(
                &BigDecimal::from(10000),
                "XOF",
                &rate,
                "EUR",
                ServiceKind::Consultation,
                ProviderRole::Doctor,
            )
            .unwrap();

        // Reference leg is Scenario A.
        assert_eq!(dual.reference.total_fee, BigDecimal::from(118));

        // Local commission is the converted reference commission (100 XOF),
        // not 1% of the converted gross.
        assert_eq!(
            dual.local.commission,
            BigDecimal::from_str("0.15").unwrap()
        );

        // Each leg's own invariants hold exactly.
        assert_eq!(
            dual.local.total_fee,
            &dual.local.commission + &dual.local.tax
        );
        assert_eq!(
            &dual.local.net + &dual.local.total_fee,
            dual.local.gross
        );
    }
}
