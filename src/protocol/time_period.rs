//! Hidden service time period calculation
//!
//! Service identity keys rotate once per time period. Client and service
//! never exchange the period number; both compute it from their own
//! clock, so the functions here must be pure and give identical results
//! for identical timestamps. Clock agreement between the two sides is a
//! precondition owned by the surrounding system.

/// Length of one time period, in minutes (24 hours)
pub const TIME_PERIOD_LENGTH_MINUTES: u64 = 24 * 60;

/// Rotation offset from the epoch, in minutes (12 hours), aligning
/// period boundaries to 12:00 UTC
pub const TIME_PERIOD_ROTATION_OFFSET_MINUTES: u64 = 12 * 60;

/// Time period number containing `unix_seconds`.
///
/// Boundaries are half-open: the instant exactly on a boundary belongs
/// to the new period.
pub fn time_period_num(unix_seconds: u64) -> u64 {
    let minutes = unix_seconds / 60;
    minutes.saturating_sub(TIME_PERIOD_ROTATION_OFFSET_MINUTES) / TIME_PERIOD_LENGTH_MINUTES
}

/// The period after the one containing `unix_seconds`.
pub fn next_time_period_num(unix_seconds: u64) -> u64 {
    time_period_num(unix_seconds) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2016-04-13 11:00:00 UTC
    const EXAMPLE_TIME: u64 = 1_460_545_200;

    #[test]
    fn test_example_period() {
        assert_eq!(time_period_num(EXAMPLE_TIME), 16903);
    }

    #[test]
    fn test_boundary_at_second_precision() {
        // 11:59:59 UTC is still in the same period
        assert_eq!(time_period_num(EXAMPLE_TIME + 3599), 16903);

        // 12:00:00 UTC exactly starts the next one
        assert_eq!(time_period_num(EXAMPLE_TIME + 3600), 16904);
    }

    #[test]
    fn test_next_period() {
        assert_eq!(next_time_period_num(EXAMPLE_TIME + 3600), 16905);
    }

    #[test]
    fn test_monotonic_over_a_week() {
        let mut last = time_period_num(EXAMPLE_TIME);
        for hour in 1..(7 * 24) {
            let tn = time_period_num(EXAMPLE_TIME + hour * 3600);
            assert!(tn >= last);
            assert!(tn - last <= 1);
            last = tn;
        }
        // Seven boundary crossings in seven days
        assert_eq!(last, 16903 + 7);
    }
}
