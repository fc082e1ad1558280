use bigdecimal::BigDecimal;
use caresettle::fees::FeePolicy;
use caresettle::types::{ProviderRole, ServiceKind};
use std::str::FromStr;

fn policy() -> FeePolicy {
    FeePolicy::default()
}

#[test]
fn scenario_zero_decimal_reference_amounts() {
    // gross 10,000 in a zero-decimal currency, 1% commission, 18% tax on
    // the commission.
    let breakdown = policy()
        .compute(
            &BigDecimal::from(10_000),
            "XOF",
            ServiceKind::Consultation,
            ProviderRole::Doctor,
        )
        .unwrap();

    assert_eq!(breakdown.commission, BigDecimal::from(100));
    assert_eq!(breakdown.tax, BigDecimal::from(18));
    assert_eq!(breakdown.total_fee, BigDecimal::from(118));
    assert_eq!(breakdown.net, BigDecimal::from(9_882));
}

#[test]
fn fee_balance_holds_across_amounts_and_currencies() {
    let policy = policy();
    let one_minor_xof = BigDecimal::from(1);
    let one_minor_usd = BigDecimal::from_str("0.01").unwrap();

    for gross in [1, 3, 49, 101, 999, 12_345, 1_000_000] {
        for (currency, tolerance) in [("XOF", &one_minor_xof), ("USD", &one_minor_usd)] {
            let gross = BigDecimal::from(gross);
            let b = policy
                .compute(&gross, currency, ServiceKind::Consultation, ProviderRole::Doctor)
                .unwrap();

            // commission + tax == total, exactly.
            assert_eq!(b.total_fee, &b.commission + &b.tax);
            // net + total == gross, exactly (total is derived, not rounded).
            assert_eq!(&b.net + &b.total_fee, gross);
            // Rounding error of each component stays within one minor unit.
            let raw_commission = &b.gross * &b.commission_rate;
            assert!((&b.commission - raw_commission).abs() <= *tolerance);
        }
    }
}

#[test]
fn dual_currency_legs_agree_within_one_minor_unit() {
    let policy = policy();
    let rate = BigDecimal::from_str("0.00152449").unwrap(); // XOF -> EUR

    let dual = policy
        .compute_dual(
            &BigDecimal::from(10_000),
            "XOF",
            &rate,
            "EUR",
            ServiceKind::Consultation,
            ProviderRole::Doctor,
        )
        .unwrap();

    // Both legs balance internally.
    assert_eq!(
        dual.reference.total_fee,
        &dual.reference.commission + &dual.reference.tax
    );
    assert_eq!(dual.local.total_fee, &dual.local.commission + &dual.local.tax);
    assert_eq!(&dual.local.net + &dual.local.total_fee, dual.local.gross);

    // The local commission is the converted reference commission, within
    // one minor unit of the exact conversion.
    let exact = &dual.reference.commission * &rate;
    let one_minor = BigDecimal::from_str("0.01").unwrap();
    assert!((&dual.local.commission - exact).abs() <= one_minor);
}

#[test]
fn exempt_kind_returns_zero_fees_in_both_legs() {
    let policy = policy();
    let rate = BigDecimal::from_str("655.957").unwrap(); // EUR -> XOF

    let dual = policy
        .compute_dual(
            &BigDecimal::from(200),
            "EUR",
            &rate,
            "XOF",
            ServiceKind::WalletTopUp,
            ProviderRole::Hospital,
        )
        .unwrap();

    assert!(dual.reference.exempt);
    assert!(dual.local.exempt);
    assert_eq!(dual.reference.total_fee, BigDecimal::from(0));
    assert_eq!(dual.local.total_fee, BigDecimal::from(0));
    assert_eq!(dual.local.net, dual.local.gross);
}

#[test]
fn two_decimal_currency_rounds_each_component() {
    let breakdown = policy()
        .compute(
            &BigDecimal::from_str("123.45").unwrap(),
            "USD",
            ServiceKind::PharmacyOrder,
            ProviderRole::Pharmacy,
        )
        .unwrap();

    // 1% of 123.45 = 1.2345 -> 1.23; 18% of 1.23 = 0.2214 -> 0.22.
    assert_eq!(breakdown.commission, BigDecimal::from_str("1.23").unwrap());
    assert_eq!(breakdown.tax, BigDecimal::from_str("0.22").unwrap());
    assert_eq!(breakdown.total_fee, BigDecimal::from_str("1.45").unwrap());
    assert_eq!(breakdown.net, BigDecimal::from_str("122.00").unwrap());
}
