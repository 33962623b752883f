//! Money helpers using rust_decimal for precision
//!
//! Commerce amounts arrive as decimal strings (`"10.00"`); the POS system
//! takes integer minor units (cents). All arithmetic is done on `Decimal`.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Largest absolute amount accepted from an order payload (1,000,000,000,000)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Round to 2 decimal places (half away from zero)
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether an amount is within [`MAX_AMOUNT`] of zero
#[inline]
pub fn in_range(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT
}

/// Sum of amounts, saturating at the `Decimal` bounds
pub fn sum_money(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(amount))
}

/// Unit price × quantity, saturating at the `Decimal` bounds
#[inline]
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price.saturating_mul(Decimal::from(quantity))
}

/// Convert a decimal amount to integer minor units (`10.995` → `1100`)
///
/// Saturates at `i64::MIN`/`i64::MAX` for values that cannot be represented.
pub fn to_minor_units(value: Decimal) -> i64 {
    round_money(value)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .unwrap_or(if value.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
}

/// Convert integer minor units back to a decimal amount (`1100` → `11.00`)
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, DECIMAL_PLACES)
}

/// Clamp negative amounts to zero
#[inline]
pub fn non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}
