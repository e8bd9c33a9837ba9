use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// User-configured recording duration.
///
/// Whole minutes, or unbounded (manual stop only). Parsing is permissive:
/// non-numeric input clamps to one minute rather than producing a validation
/// error, while zero or negative values mean unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordDuration {
    Unbounded,
    Minutes(u32),
}

impl RecordDuration {
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes <= 0 {
            RecordDuration::Unbounded
        } else {
            RecordDuration::Minutes(minutes.min(u32::MAX as i64) as u32)
        }
    }

    /// Parse free-form user input; garbage clamps to the one-minute minimum
    pub fn from_input(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(minutes) => Self::from_minutes(minutes),
            Err(_) => RecordDuration::Minutes(1),
        }
    }

    /// The countdown to arm, if any
    pub fn countdown(&self) -> Option<Duration> {
        match self {
            RecordDuration::Unbounded => None,
            RecordDuration::Minutes(minutes) => {
                Some(Duration::from_secs(*minutes as u64 * 60))
            }
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, RecordDuration::Minutes(_))
    }
}

impl fmt::Display for RecordDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDuration::Unbounded => write!(f, "unbounded"),
            RecordDuration::Minutes(minutes) => write!(f, "{} min", minutes),
        }
    }
}
