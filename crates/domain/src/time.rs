//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for channel updates, last-seen tracking and command deadlines.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a configured [`std::time::Duration`] into a timestamp delta,
/// saturating instead of failing on absurd values.
#[must_use]
pub fn delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_convert_std_duration() {
        let converted = delta(std::time::Duration::from_millis(1500));
        assert_eq!(converted.num_milliseconds(), 1500);
    }

    #[test]
    fn should_saturate_huge_duration() {
        assert_eq!(delta(std::time::Duration::MAX), TimeDelta::MAX);
    }
}
