//! Numeric scale policy for monetary amounts.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All amounts are `rust_decimal::Decimal`. Functional (base-currency) amounts are kept at
//! 4 decimal places internally and shown at 2. Rounding is always Banker's Rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Internal scale for functional (base-currency) amounts.
pub const FUNCTIONAL_SCALE: u32 = 4;

/// Scale used when presenting amounts.
pub const DISPLAY_SCALE: u32 = 2;

/// Rounds a value to the functional scale using Banker's Rounding.
#[must_use]
pub fn round_functional(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FUNCTIONAL_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Rounds a value to the display scale using Banker's Rounding.
#[must_use]
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Largest functional residue a set of `lines` independently rounded amounts can carry.
///
/// Each rounding to [`FUNCTIONAL_SCALE`] moves a value by at most half a unit in the last
/// place, so `n` lines drift by at most `n * 0.00005`.
#[must_use]
pub fn rounding_tolerance(lines: usize) -> Decimal {
    let half_unit = Decimal::new(5, FUNCTIONAL_SCALE + 1);
    half_unit * Decimal::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(123.456789), dec!(123.4568))]
    #[case(dec!(0.00005), dec!(0.0000))]
    #[case(dec!(0.00015), dec!(0.0002))]
    #[case(dec!(-2.00025), dec!(-2.0002))]
    fn test_round_functional(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_functional(input), expected);
    }

    #[rstest]
    #[case(dec!(2.345), dec!(2.34))]
    #[case(dec!(2.355), dec!(2.36))]
    #[case(dec!(100), dec!(100))]
    fn test_round_display(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_display(input), expected);
    }

    #[test]
    fn test_rounding_tolerance_scales_with_lines() {
        assert_eq!(rounding_tolerance(0), Decimal::ZERO);
        assert_eq!(rounding_tolerance(1), dec!(0.00005));
        assert_eq!(rounding_tolerance(4), dec!(0.0002));
    }
}
