//! Timestamp parsing for speaker timelines.
//!
//! Timeline boundaries are written as `HH:MM:SS` or `MM:SS`. Every component
//! must be exactly two digits, so `"05:03"` parses while `"5:3"` does not.

use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS or MM:SS")]
    InvalidFormat(String),

    #[error("Invalid {component} value {value} in timestamp '{timestamp}'")]
    OutOfRange {
        component: &'static str,
        value: u32,
        timestamp: String,
    },
}

/// Parse a timeline timestamp to whole seconds.
///
/// # Examples
/// ```
/// use sclip_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330);
/// assert!(parse_timestamp("5:3").is_err());
/// ```
pub fn parse_timestamp(ts: &str) -> Result<u32, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (
            parse_component(h, ts)?,
            parse_component(m, ts)?,
            parse_component(s, ts)?,
        ),
        [m, s] => (0, parse_component(m, ts)?, parse_component(s, ts)?),
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    check_range("hours", hours, 23, ts)?;
    check_range("minutes", minutes, 59, ts)?;
    check_range("seconds", seconds, 59, ts)?;

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Format whole seconds as `HH:MM:SS`.
pub fn format_seconds(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn parse_component(part: &str, ts: &str) -> Result<u32, TimestampError> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }
    part.parse()
        .map_err(|_| TimestampError::InvalidFormat(ts.to_string()))
}

fn check_range(component: &'static str, value: u32, max: u32, ts: &str) -> Result<(), TimestampError> {
    if value > max {
        return Err(TimestampError::OutOfRange {
            component,
            value,
            timestamp: ts.to_string(),
        });
    }
    Ok(())
}
