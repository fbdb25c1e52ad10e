use std::str::FromStr;

use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};

/// Rounds half away from zero at `scale` decimal places.
///
/// The tie is decided on the shortest decimal text of the value, not on its
/// binary expansion, so `2.675` becomes `2.68` even though the nearest double
/// is slightly below it. Non-finite values, and values too large for a
/// [`Decimal`], are returned unchanged.
pub fn round_half_up(value: f64, scale: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let decimal = match Decimal::from_str(&value.to_string()) {
        Ok(d) => d,
        Err(_) => match Decimal::from_f64(value) {
            Some(d) => d,
            None => return value,
        },
    };
    let rounded = decimal.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);

    // Back through text so the result is the double nearest the decimal.
    f64::from_str(&rounded.to_string()).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(round_half_up(2.675, 2), 2.68);
        assert_eq!(round_half_up(1.005, 2), 1.01);
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(-1.005, 2), -1.01);
    }

    #[test]
    fn carry_propagates_into_the_integer_part() {
        assert_eq!(round_half_up(9.995, 2), 10.0);
        assert_eq!(round_half_up(99.999, 2), 100.0);
    }

    #[test]
    fn below_half_rounds_down() {
        assert_eq!(round_half_up(3.14159, 2), 3.14);
        assert_eq!(round_half_up(0.004, 2), 0.0);
    }

    #[test]
    fn short_values_are_unchanged() {
        assert_eq!(round_half_up(12.5, 2), 12.5);
        assert_eq!(round_half_up(42.0, 2), 42.0);
        assert_eq!(round_half_up(0.0, 2), 0.0);
    }

    #[test]
    fn tiny_and_huge_values_do_not_panic() {
        assert_eq!(round_half_up(1e-30, 2), 0.0);
        assert_eq!(round_half_up(1e30, 2), 1e30);
        assert_eq!(round_half_up(-0.001, 2), 0.0);
    }

    #[test]
    fn non_finite_values_pass_through() {
        assert!(round_half_up(f64::NAN, 2).is_nan());
        assert_eq!(round_half_up(f64::INFINITY, 2), f64::INFINITY);
    }
}
