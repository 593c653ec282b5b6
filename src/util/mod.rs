//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::time::Duration;

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts whole milliseconds to a duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Clamps a wide integer into `[min, max]` and narrows it.
///
/// `min` and `max` must fit in `T`; callers pass the configured band.
pub fn clamp_to<T>(value: i64, min: T, max: T) -> T
where
    T: Copy + Into<i64> + TryFrom<i64>,
{
    let clamped = value.clamp(min.into(), max.into());
    T::try_from(clamped).unwrap_or(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion() {
        let duration = Duration::from_millis(1500);
        let millis = duration_to_millis(duration);
        assert_eq!(millis, 1500);
        assert_eq!(millis_to_duration(millis), duration);
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(clamp_to::<i32>(2000, 2800, 3100), 2800);
        assert_eq!(clamp_to::<i32>(4000, 2800, 3100), 3100);
        assert_eq!(clamp_to::<i32>(2992, 2800, 3100), 2992);
        assert_eq!(clamp_to::<u8>(-5, 0, 100), 0);
        assert_eq!(clamp_to::<u8>(150, 0, 100), 100);
        assert_eq!(clamp_to::<u8>(i64::MAX, 0, 100), 100);
    }
}
