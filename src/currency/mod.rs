//! Currency handling: minor-unit precision, rounding, formatting, and the
//! static fallback rate table used as the last resort of rate resolution.

pub mod conversion;
pub mod rate_providers;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use std::str::FromStr;

use crate::currency::conversion::ConversionError;

/// Currencies whose minor unit is the whole unit (no decimal places).
pub const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "XOF", "XAF", "JPY", "KRW", "RWF", "GNF", "UGX", "VND", "CLP", "DJF",
];

/// Last-resort rates, keyed by (from, to). Consulted only after the cache,
/// the persisted store and the external API have all failed to resolve.
pub const STATIC_FALLBACK_RATES: &[(&str, &str, &str)] = &[
    ("EUR", "XOF", "655.957"),
    ("XOF", "EUR", "0.00152449"),
    ("USD", "XOF", "601.50"),
    ("XOF", "USD", "0.00166251"),
    ("XOF", "XAF", "1"),
    ("XAF", "XOF", "1"),
    ("USD", "NGN", "1540.00"),
    ("NGN", "USD", "0.00064935"),
    ("XOF", "NGN", "2.5603"),
    ("NGN", "XOF", "0.39058"),
    ("USD", "GHS", "12.35"),
    ("GHS", "USD", "0.08097"),
];

/// Minor-unit precision for a currency: 0 for the zero-decimal set, 2 otherwise.
pub fn precision(currency: &str) -> i64 {
    if ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(currency))
    {
        0
    } else {
        2
    }
}

/// Round an amount half-up to the currency's minor-unit precision.
pub fn round_amount(amount: &BigDecimal, currency: &str) -> BigDecimal {
    amount.with_scale_round(precision(currency), RoundingMode::HalfUp)
}

/// Convert an amount to an integer count of minor units, as the gateway
/// expects. Fails on amounts too large for i64.
pub fn to_minor_units(amount: &BigDecimal, currency: &str) -> Result<i64, ConversionError> {
    let scale = precision(currency) as u32;
    let factor = BigDecimal::from(10_i64.pow(scale));
    let scaled = (amount * factor).with_scale_round(0, RoundingMode::HalfUp);
    scaled.to_i64().ok_or_else(|| {
        ConversionError::AmountOutOfRange(format!(
            "{} {} does not fit in minor units",
            amount, currency
        ))
    })
}

/// Reconstruct a decimal amount from an integer count of minor units.
pub fn from_minor_units(minor: i64, currency: &str) -> BigDecimal {
    let scale = precision(currency) as u32;
    BigDecimal::from(minor) / BigDecimal::from(10_i64.pow(scale))
}

enum SymbolPosition {
    Prefix,
    Suffix,
}

fn symbol(currency: &str) -> (&'static str, SymbolPosition) {
    match currency.to_uppercase().as_str() {
        "XOF" | "XAF" => ("F CFA", SymbolPosition::Suffix),
        "NGN" => ("₦", SymbolPosition::Prefix),
        "GHS" => ("GH₵", SymbolPosition::Prefix),
        "KES" => ("KSh", SymbolPosition::Prefix),
        "USD" => ("$", SymbolPosition::Prefix),
        "EUR" => ("€", SymbolPosition::Prefix),
        "GBP" => ("£", SymbolPosition::Prefix),
        "JPY" => ("¥", SymbolPosition::Prefix),
        _ => ("", SymbolPosition::Prefix),
    }
}

/// Render an amount with the currency's symbol template, e.g.
/// `10000 F CFA` or `₦1500.00`. Unknown currencies fall back to the code.
pub fn format_amount(amount: &BigDecimal, currency: &str) -> String {
    let rounded = round_amount(amount, currency);
    match symbol(currency) {
        ("", _) => format!("{} {}", currency.to_uppercase(), rounded),
        (sym, SymbolPosition::Prefix) => format!("{}{}", sym, rounded),
        (sym, SymbolPosition::Suffix) => format!("{} {}", rounded, sym),
    }
}

/// Look up a static fallback rate for a currency pair.
pub fn static_fallback_rate(from: &str, to: &str) -> Option<BigDecimal> {
    STATIC_FALLBACK_RATES
        .iter()
        .find(|(f, t, _)| f.eq_ignore_ascii_case(from) && t.eq_ignore_ascii_case(to))
        .and_then(|(_, _, rate)| BigDecimal::from_str(rate).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_distinguishes_zero_decimal_currencies() {
        assert_eq!(precision("XOF"), 0);
        assert_eq!(precision("xof"), 0);
        assert_eq!(precision("JPY"), 0);
        assert_eq!(precision("USD"), 2);
        assert_eq!(precision("NGN"), 2);
    }

    #[test]
    fn rounding_is_half_up_at_currency_precision() {
        let amount = BigDecimal::from_str("100.5").unwrap();
        assert_eq!(round_amount(&amount, "XOF"), BigDecimal::from(101));

        let amount = BigDecimal::from_str("10.005").unwrap();
        assert_eq!(
            round_amount(&amount, "USD"),
            BigDecimal::from_str("10.01").unwrap()
        );

        let amount = BigDecimal::from_str("10.004").unwrap();
        assert_eq!(
            round_amount(&amount, "USD"),
            BigDecimal::from_str("10.00").unwrap()
        );
    }

    #[test]
    fn minor_units_round_trip() {
        let amount = BigDecimal::from_str("1500.25").unwrap();
        let minor = to_minor_units(&amount, "USD").unwrap();
        assert_eq!(minor, 150025);
        assert_eq!(from_minor_units(minor, "USD"), amount);

        let amount = BigDecimal::from(10000);
        let minor = to_minor_units(&amount, "XOF").unwrap();
        assert_eq!(minor, 10000);
        assert_eq!(from_minor_units(minor, "XOF"), amount);
    }

    #[test]
    fn formatting_applies_symbol_position() {
        assert_eq!(format_amount(&BigDecimal::from(10000), "XOF"), "10000 F CFA");
        assert_eq!(
            format_amount(&BigDecimal::from_str("1500.5").unwrap(), "NGN"),
            "₦1500.50"
        );
        assert_eq!(
            format_amount(&BigDecimal::from(42), "AUD"),
            "AUD 42.00"
        );
    }

    #[test]
    fn static_table_covers_the_cfa_peg_both_ways() {
        let eur_xof = static_fallback_rate("EUR", "XOF").unwrap();
        assert_eq!(eur_xof, BigDecimal::from_str("655.957").unwrap());
        assert!(static_fallback_rate("XOF", "EUR").is_some());
        assert!(static_fallback_rate("XOF", "ZZZ").is_none());
    }
}
