//! Wall clock with a frozen variant for tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Instant every nulled clock reports unless told otherwise.
pub fn default_null_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 24, 14, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    System,
    Fixed(DateTime<Utc>),
}

/// Source of the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    source: Source,
}

impl Clock {
    /// Real clock backed by the system time.
    pub fn create() -> Self {
        Self {
            source: Source::System,
        }
    }

    /// Clock frozen at `fixed`, or at [`default_null_instant`].
    pub fn create_null(fixed: Option<DateTime<Utc>>) -> Self {
        Self {
            source: Source::Fixed(fixed.unwrap_or_else(default_null_instant)),
        }
    }

    /// Current instant. Each call returns an independent value.
    pub fn date(&self) -> DateTime<Utc> {
        match self.source {
            Source::System => Utc::now(),
            Source::Fixed(instant) => instant,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> i64 {
        self.date().timestamp_millis()
    }

    /// Current UTC calendar date.
    pub fn today(&self) -> NaiveDate {
        self.date().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_clock_defaults_to_shared_instant() {
        let clock = Clock::create_null(None);
        assert_eq!(clock.date().to_rfc3339(), "2024-06-24T14:00:00+00:00");
        assert_eq!(clock.millis(), 1_719_237_600_000);
        assert_eq!(clock.today().to_string(), "2024-06-24");
    }

    #[test]
    fn null_clock_returns_fixed_instant_every_time() {
        let fixed = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().expect("valid");
        let clock = Clock::create_null(Some(fixed));
        assert_eq!(clock.date(), fixed);
        assert_eq!(clock.date(), fixed);
    }

    /// Values handed out are copies; changing one leaves the clock untouched.
    #[test]
    fn returned_instant_is_a_copy() {
        let clock = Clock::create_null(None);
        let mut read = clock.date();
        read += chrono::TimeDelta::hours(1);
        assert_ne!(read, clock.date());
        assert_eq!(clock.date(), default_null_instant());
    }

    #[test]
    fn real_clock_moves_forward() {
        let clock = Clock::create();
        let first = clock.date();
        let second = clock.date();
        assert!(second >= first);
        assert!(first > default_null_instant());
    }
}
