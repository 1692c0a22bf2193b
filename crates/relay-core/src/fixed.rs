use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and tests, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Move `current` toward `target` by at most `step`, never overshooting.
#[inline]
pub fn approach(current: Fixed64, target: Fixed64, step: Fixed64) -> Fixed64 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

/// Clamp a value into `[0, 1]`.
#[inline]
pub fn clamp_unit(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::ONE)
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
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 30.0);
        let b = f64_to_fixed64(1.0 / 30.0);
        assert_eq!(a, b);
        assert_eq!(a * f64_to_fixed64(30.0), b * f64_to_fixed64(30.0));
    }

    #[test]
    fn approach_up_never_overshoots() {
        let v = approach(f64_to_fixed64(0.95), Fixed64::ONE, f64_to_fixed64(0.1));
        assert_eq!(v, Fixed64::ONE);
    }

    #[test]
    fn approach_down_never_undershoots() {
        let v = approach(f64_to_fixed64(0.05), Fixed64::ZERO, f64_to_fixed64(0.1));
        assert_eq!(v, Fixed64::ZERO);
    }

    #[test]
    fn approach_partial_step() {
        let v = approach(Fixed64::ZERO, Fixed64::ONE, f64_to_fixed64(0.25));
        assert_eq!(fixed64_to_f64(v), 0.25);
    }

    #[test]
    fn clamp_unit_bounds() {
        assert_eq!(clamp_unit(f64_to_fixed64(-0.5)), Fixed64::ZERO);
        assert_eq!(clamp_unit(f64_to_fixed64(1.5)), Fixed64::ONE);
        assert_eq!(clamp_unit(f64_to_fixed64(0.5)), f64_to_fixed64(0.5));
    }
}
