// src/common/money.rs

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Converte um valor decimal (ex: 7.50) para centavos.
/// Arredonda na 2ª casa decimal (meio para longe do zero) e nunca passa por f64.
pub fn to_cents(value: Decimal) -> Option<i64> {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (rounded * Decimal::ONE_HUNDRED).to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Total de uma linha (preço unitário x quantidade), sem overflow silencioso.
pub fn line_total(unit_price_cents: i64, quantity: i32) -> Option<i64> {
    unit_price_cents.checked_mul(i64::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn converts_exact_values() {
        assert_eq!(to_cents(dec("7.50")), Some(750));
        assert_eq!(to_cents(dec("14")), Some(1400));
        assert_eq!(to_cents(dec("0.01")), Some(1));
    }

    #[test]
    fn rounds_on_second_decimal_digit() {
        assert_eq!(to_cents(dec("10.005")), Some(1001));
        assert_eq!(to_cents(dec("10.004")), Some(1000));
        assert_eq!(to_cents(dec("-1.005")), Some(-101));
        // 0.1 + 0.2 em ponto flutuante daria 0.30000000000000004
        assert_eq!(to_cents(dec("0.1") + dec("0.2")), Some(30));
    }

    #[test]
    fn cents_back_to_decimal() {
        assert_eq!(from_cents(1500), dec("15.00"));
        assert_eq!(from_cents(-1), dec("-0.01"));
    }

    #[test]
    fn line_total_detects_overflow() {
        assert_eq!(line_total(750, 2), Some(1500));
        assert_eq!(line_total(i64::MAX, 2), None);
    }
}
