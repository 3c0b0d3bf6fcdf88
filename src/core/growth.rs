use super::tax::round2;
use super::types::HoldingRecord;

pub const PREMIUM_BOND_CEILING: f64 = 50_000.0;

/// Grows the holding by its yield and returns the growth applied.
pub fn apply_yield_growth(holding: &mut HoldingRecord) -> f64 {
    let growth = round2(holding.yield_rate.ratio() * holding.value);
    holding.value += growth;
    growth
}

/// Grows a premium bond holding without letting it pass `ceiling`.
///
/// Returns the overflow: the part of the gain that no longer fits under the ceiling, or the
/// whole gain when the holding does not accumulate.
pub fn apply_premium_bond_growth(holding: &mut HoldingRecord, ceiling: f64, accumulating: bool) -> f64 {
    let gain = round2(holding.yield_rate.ratio() * holding.value);
    if !accumulating {
        return gain;
    }

    let new_value = holding.value + gain;
    if new_value >= ceiling {
        holding.value = ceiling;
        new_value - ceiling
    } else {
        holding.value = new_value;
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IncomeType;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn bond(value: f64, yield_rate: f64) -> HoldingRecord {
        HoldingRecord::new(value, true, yield_rate, IncomeType::CapitalGains)
    }

    #[test]
    fn yield_growth_rounds_to_pennies() {
        let mut holding = HoldingRecord::new(22_440.0, false, 0.0001, IncomeType::CapitalGains);
        let growth = apply_yield_growth(&mut holding);
        assert_approx(growth, 2.24);
        assert_approx(holding.value, 22_442.24);
    }

    #[test]
    fn yield_growth_ignores_tax_treatment() {
        let mut sheltered = HoldingRecord::new(67_000.0, true, 0.035, IncomeType::CapitalGains);
        let mut taxable = HoldingRecord::new(67_000.0, false, 0.035, IncomeType::CapitalGains);
        apply_yield_growth(&mut sheltered);
        apply_yield_growth(&mut taxable);
        assert_approx(sheltered.value, 69_345.0);
        assert_approx(taxable.value, sheltered.value);
    }

    #[test]
    fn premium_bond_over_ceiling_is_clamped_with_overflow() {
        let mut holding = bond(49_000.0, 0.035);
        let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, true);
        assert_approx(holding.value, 50_000.0);
        assert_approx(overflow, 715.0);
    }

    #[test]
    fn premium_bond_at_ceiling_returns_whole_gain_as_overflow() {
        let mut holding = bond(50_000.0, 0.035);
        let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, true);
        assert_approx(holding.value, 50_000.0);
        assert_approx(overflow, 1_750.0);
    }

    #[test]
    fn premium_bond_under_ceiling_grows_normally() {
        let mut holding = bond(10_000.0, 0.035);
        let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, true);
        assert_approx(holding.value, 10_350.0);
        assert_approx(overflow, 0.0);
    }

    #[test]
    fn premium_bond_landing_exactly_on_ceiling_has_zero_overflow() {
        let mut holding = bond(40_000.0, 0.25);
        let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, true);
        assert_approx(holding.value, 50_000.0);
        assert_approx(overflow, 0.0);
    }

    #[test]
    fn non_accumulating_premium_bond_realizes_whole_gain() {
        let mut holding = bond(10_000.0, 0.035);
        let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, false);
        assert_approx(holding.value, 10_000.0);
        assert_approx(overflow, 350.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_premium_bond_conserves_value_plus_overflow(
            value in 0u32..60_000,
            yield_bp in 0u32..1_000,
        ) {
            let start = (value as f64).min(PREMIUM_BOND_CEILING);
            let mut holding = bond(start, yield_bp as f64 / 10_000.0);
            let gain = round2(holding.yield_rate.ratio() * start);
            let overflow = apply_premium_bond_growth(&mut holding, PREMIUM_BOND_CEILING, true);
            prop_assert!(holding.value <= PREMIUM_BOND_CEILING + 1e-9);
            prop_assert!(overflow >= 0.0);
            prop_assert!((holding.value + overflow - (start + gain)).abs() <= 1e-6);
        }
    }
}
