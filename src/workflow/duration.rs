//! Duration Parsing
//!
//! Durations are accepted either as a plain number of milliseconds or as a
//! human-readable string with a unit suffix:
//!
//! | Suffix | Unit         |
//! |--------|--------------|
//! | `ms`   | milliseconds |
//! | `s`    | seconds      |
//! | `m`    | minutes      |
//! | `h`    | hours        |
//! | `d`    | days         |

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// A duration as written by a caller: raw milliseconds or `"<n><unit>"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationSpec {
    Millis(u64),
    Text(String),
}

impl DurationSpec {
    /// Resolves this duration to milliseconds.
    pub fn as_millis(&self) -> Result<u64> {
        parse_duration(self.clone())
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{}ms", ms),
            Self::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<u64> for DurationSpec {
    fn from(ms: u64) -> Self {
        Self::Millis(ms)
    }
}

impl From<&str> for DurationSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for DurationSpec {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Duration> for DurationSpec {
    fn from(duration: Duration) -> Self {
        Self::Millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Parses a duration into milliseconds.
///
/// # Example
///
/// ```
/// use steprunner::workflow::parse_duration;
///
/// assert_eq!(parse_duration(5000u64).unwrap(), 5000);
/// assert_eq!(parse_duration("5s").unwrap(), 5000);
/// assert_eq!(parse_duration("2h").unwrap(), 7_200_000);
/// assert!(parse_duration("bogus").is_err());
/// ```
pub fn parse_duration(duration: impl Into<DurationSpec>) -> Result<u64> {
    match duration.into() {
        DurationSpec::Millis(ms) => Ok(ms),
        DurationSpec::Text(text) => parse_text(&text),
    }
}

fn parse_text(text: &str) -> Result<u64> {
    let invalid = || WorkflowError::InvalidDuration(text.to_string());

    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(invalid()),
    };

    value.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_millis() {
        assert_eq!(parse_duration(5000u64).unwrap(), 5000);
        assert_eq!(parse_duration(0u64).unwrap(), 0);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("250ms").unwrap(), 250);
        assert_eq!(parse_duration("5s").unwrap(), 5_000);
        assert_eq!(parse_duration("3m").unwrap(), 180_000);
        assert_eq!(parse_duration("2h").unwrap(), 7_200_000);
        assert_eq!(parse_duration("1d").unwrap(), 86_400_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("bogus").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("s5").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn test_parse_error_names_input() {
        let err = parse_duration("soon").unwrap_err();
        assert!(err.to_string().contains("'soon'"));
    }

    #[test]
    fn test_parse_overflow_is_error() {
        assert!(parse_duration("99999999999999999d").is_err());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_duration(" 10s ").unwrap(), 10_000);
    }

    #[test]
    fn test_from_std_duration() {
        let duration = DurationSpec::from(Duration::from_secs(2));
        assert_eq!(duration, DurationSpec::Millis(2_000));
    }

    #[test]
    fn test_duration_deserializes_number_or_string() {
        let number: DurationSpec = serde_json::from_str("1500").unwrap();
        assert_eq!(number.as_millis().unwrap(), 1_500);

        let text: DurationSpec = serde_json::from_str("\"2s\"").unwrap();
        assert_eq!(text.as_millis().unwrap(), 2_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(DurationSpec::Millis(5).to_string(), "5ms");
        assert_eq!(DurationSpec::from("1h").to_string(), "1h");
    }
}
