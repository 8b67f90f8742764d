//! ISO-8601 duration value object.
//!
//! Durations travel through requests and storage in their canonical string
//! form (`PT1H`, `PT1H30M`, `PT0S`). Parsing accepts days and fractional
//! seconds and normalizes everything to hours, minutes, and seconds.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:([0-9]+)D)?(?:T(?:([0-9]+)H)?(?:([0-9]+)M)?(?:([0-9]+)(?:\.([0-9]{1,3}))?S)?)?$")
        .expect("valid duration regex")
});

/// Returned when a string is not an ISO-8601 duration this type understands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ISO-8601 duration: {input:?}")]
pub struct DurationParseError {
    pub input: String,
}

/// Non-negative duration with millisecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoDuration {
    millis: u64,
}

impl IsoDuration {
    pub const ZERO: IsoDuration = IsoDuration { millis: 0 };

    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self {
            millis: secs * MILLIS_PER_SECOND,
        }
    }

    pub const fn from_minutes(minutes: u64) -> Self {
        Self {
            millis: minutes * MILLIS_PER_MINUTE,
        }
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self {
            millis: hours * MILLIS_PER_HOUR,
        }
    }

    pub const fn as_millis(self) -> u64 {
        self.millis
    }

    pub const fn as_secs(self) -> u64 {
        self.millis / MILLIS_PER_SECOND
    }

    /// Fractional hours, used by time summaries.
    pub fn as_hours_f64(self) -> f64 {
        self.millis as f64 / MILLIS_PER_HOUR as f64
    }

    pub const fn is_zero(self) -> bool {
        self.millis == 0
    }

    pub fn checked_sub(self, other: IsoDuration) -> Option<IsoDuration> {
        self.millis.checked_sub(other.millis).map(Self::from_millis)
    }

    pub fn saturating_sub(self, other: IsoDuration) -> IsoDuration {
        Self::from_millis(self.millis.saturating_sub(other.millis))
    }
}

impl Add for IsoDuration {
    type Output = IsoDuration;

    fn add(self, rhs: IsoDuration) -> IsoDuration {
        Self::from_millis(self.millis.saturating_add(rhs.millis))
    }
}

impl std::iter::Sum for IsoDuration {
    fn sum<I: Iterator<Item = IsoDuration>>(iter: I) -> Self {
        iter.fold(IsoDuration::ZERO, Add::add)
    }
}

impl From<std::time::Duration> for IsoDuration {
    fn from(duration: std::time::Duration) -> Self {
        Self::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<IsoDuration> for std::time::Duration {
    fn from(duration: IsoDuration) -> Self {
        std::time::Duration::from_millis(duration.millis)
    }
}

impl FromStr for IsoDuration {
    type Err = DurationParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationParseError {
            input: input.to_string(),
        };
        let caps = DURATION_RE.captures(input).ok_or_else(invalid)?;

        // "P" and "PT" match the pattern but carry no component.
        if (1..=4).all(|i| caps.get(i).is_none()) || input.ends_with('T') {
            return Err(invalid());
        }

        let component = |index: usize, unit: u64| -> Result<u64, DurationParseError> {
            match caps.get(index) {
                None => Ok(0),
                Some(m) => m
                    .as_str()
                    .parse::<u64>()
                    .ok()
                    .and_then(|n| n.checked_mul(unit))
                    .ok_or_else(invalid),
            }
        };
        let fraction = match caps.get(5) {
            None => 0,
            Some(m) => {
                // At most three ASCII digits: "5" is 500ms, "05" is 50ms.
                let digits = m.as_str();
                let scale = 3u32
                    .checked_sub(u32::try_from(digits.len()).map_err(|_| invalid())?)
                    .map(|exp| 10u64.pow(exp))
                    .ok_or_else(invalid)?;
                digits.parse::<u64>().map_err(|_| invalid())? * scale
            }
        };

        [
            component(1, MILLIS_PER_DAY)?,
            component(2, MILLIS_PER_HOUR)?,
            component(3, MILLIS_PER_MINUTE)?,
            component(4, MILLIS_PER_SECOND)?,
            fraction,
        ]
        .into_iter()
        .try_fold(0u64, u64::checked_add)
        .map(Self::from_millis)
        .ok_or_else(invalid)
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis == 0 {
            return f.write_str("PT0S");
        }
        let hours = self.millis / MILLIS_PER_HOUR;
        let minutes = self.millis % MILLIS_PER_HOUR / MILLIS_PER_MINUTE;
        let seconds = self.millis % MILLIS_PER_MINUTE / MILLIS_PER_SECOND;
        let millis = self.millis % MILLIS_PER_SECOND;

        f.write_str("PT")?;
        if hours > 0 {
            write!(f, "{hours}H")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}M")?;
        }
        if millis > 0 {
            let fraction = format!("{millis:03}");
            write!(f, "{seconds}.{}S", fraction.trim_end_matches('0'))?;
        } else if seconds > 0 {
            write!(f, "{seconds}S")?;
        }
        Ok(())
    }
}

impl Serialize for IsoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
