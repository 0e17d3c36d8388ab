use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Milliseconds of game time. All timers and durations use this unit.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in the tick loop.
///
/// Out-of-range values saturate and NaN maps to zero. Use
/// [`checked_f64_to_fixed64`] where such values must be rejected.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert an f64 to Fixed64, or `None` if it is NaN or outside the Q32.32 range.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    if v.is_nan() {
        return None;
    }
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Price of the next purchase in an escalating series:
/// `round(base * multiplier^count)`.
///
/// Saturates at `Fixed64::MAX` rather than overflowing, so a runaway counter
/// yields an unaffordable price instead of a wrapped cheap one.
pub fn escalating_cost(base: Fixed64, multiplier: Fixed64, count: u32) -> u64 {
    let mut cost = base;
    for _ in 0..count {
        cost = cost.saturating_mul(multiplier);
    }
    let rounded: i64 = cost.saturating_round().to_num();
    rounded.max(0) as u64
}

/// `numerator / denominator` clamped to `[0, 1]`. A zero denominator is
/// treated as an already-finished window.
pub fn progress_fraction(numerator: Millis, denominator: Millis) -> Fixed64 {
    if denominator == 0 || numerator >= denominator {
        return Fixed64::ONE;
    }
    // Computed on raw Q32.32 bits so long game clocks never overflow the
    // 32 integer bits. numerator < denominator keeps the quotient below 2^32.
    let bits = ((numerator as u128) << 32) / denominator as u128;
    Fixed64::from_bits(bits as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn out_of_range_conversion_saturates() {
        assert_eq!(f64_to_fixed64(3.0e9), Fixed64::MAX);
        assert_eq!(f64_to_fixed64(-3.0e9), Fixed64::MIN);
        assert_eq!(f64_to_fixed64(f64::NAN), Fixed64::ZERO);
        assert_eq!(f64_to_fixed64(f64::INFINITY), Fixed64::MAX);
    }

    #[test]
    fn checked_conversion_rejects_out_of_range() {
        assert_eq!(checked_f64_to_fixed64(1.5), Some(f64_to_fixed64(1.5)));
        assert_eq!(checked_f64_to_fixed64(3.0e9), None);
        assert_eq!(checked_f64_to_fixed64(f64::NAN), None);
        assert_eq!(checked_f64_to_fixed64(f64::INFINITY), None);
    }

    #[test]
    fn escalating_cost_count_zero_is_base() {
        assert_eq!(escalating_cost(f64_to_fixed64(625.0), f64_to_fixed64(1.2), 0), 625);
    }

    #[test]
    fn escalating_cost_rounds_to_nearest() {
        // 625 * 1.2 = 750 (the fixed representation of 1.2 is slightly low).
        assert_eq!(escalating_cost(f64_to_fixed64(625.0), f64_to_fixed64(1.2), 1), 750);
        // 10 * 1.5^2 = 22.5 -> 23
        assert_eq!(escalating_cost(f64_to_fixed64(10.0), f64_to_fixed64(1.5), 2), 23);
    }

    #[test]
    fn escalating_cost_saturates() {
        let cost = escalating_cost(f64_to_fixed64(1000.0), f64_to_fixed64(10.0), 40);
        assert_eq!(cost, i32::MAX as u64);
    }

    #[test]
    fn escalating_cost_flat_multiplier() {
        for n in 0..10 {
            assert_eq!(escalating_cost(f64_to_fixed64(30.0), Fixed64::ONE, n), 30);
        }
    }

    #[test]
    fn progress_fraction_clamps() {
        assert_eq!(progress_fraction(0, 100), Fixed64::ZERO);
        assert_eq!(progress_fraction(50, 100), f64_to_fixed64(0.5));
        assert_eq!(progress_fraction(150, 100), Fixed64::ONE);
    }

    #[test]
    fn progress_fraction_zero_window_is_complete() {
        assert_eq!(progress_fraction(0, 0), Fixed64::ONE);
    }
}
