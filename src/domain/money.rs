//! Monetary types for price and quantity representation.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Rupee amount represented as a Decimal for precision.
pub type Price = Decimal;

/// Contract quantity (number of units, a multiple of the lot size).
pub type Quantity = u32;

/// Convert a market-data float into a price rounded to the paisa.
#[must_use]
pub fn price_from_f64(value: f64) -> Price {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

/// Convert a price back into a float for indicator math.
#[must_use]
pub fn price_to_f64(value: Price) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn float_prices_round_to_two_places() {
        assert_eq!(price_from_f64(81234.567), dec!(81234.57));
        assert_eq!(price_from_f64(f64::NAN), Decimal::ZERO);
    }
}
