//! Small numeric and timing helpers for pump_core.

use std::time::Duration;

/// Lower bound for the control-loop tick.
pub const MIN_POLL: Duration = Duration::from_millis(1);

/// Clamp a percentage into `[0, 100]`. Non-finite values map to 0.
#[inline]
pub fn clamp_percent(p: f64) -> f64 {
    if p.is_finite() { p.clamp(0.0, 100.0) } else { 0.0 }
}

/// Floor a quantity at 0. Non-finite values map to 0.
#[inline]
pub fn non_negative(x: f64) -> f64 {
    if x.is_finite() { x.max(0.0) } else { 0.0 }
}

/// Poll period from milliseconds, never zero.
#[inline]
pub fn poll_period(ms: u64) -> Duration {
    Duration::from_millis(ms).max(MIN_POLL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(55.5), 55.5);
        assert_eq!(clamp_percent(140.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
    }

    #[test]
    fn zero_poll_is_bumped() {
        assert_eq!(poll_period(0), MIN_POLL);
        assert_eq!(poll_period(100), Duration::from_millis(100));
    }
}
