use chrono::{DateTime, Utc};
use thiserror::Error;

use cn_core::TimeWindow;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} exceeds max length of {max}")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid timestamp format for {field}")]
    BadTimestamp { field: &'static str },
}

const MAX_MESSAGE_LEN: usize = 4096;
const MAX_TITLE_LEN: usize = 512;

/// Validate and trim a chat message body.
pub fn validate_message(message: Option<&str>) -> Result<&str, ValidationError> {
    let message = message.map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(ValidationError::Missing { field: "message" });
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(ValidationError::TooLong {
            field: "message",
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(message)
}

pub fn validate_title(title: Option<&str>) -> Result<&str, ValidationError> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(ValidationError::Missing { field: "title" });
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title",
            max: MAX_TITLE_LEN,
        });
    }
    Ok(title)
}

/// Parse one RFC 3339 timestamp (both `Z` and offset forms).
pub fn parse_timestamp(
    field: &'static str,
    raw: Option<&str>,
) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::BadTimestamp { field })
}

/// Parse a conversation window. Rejected before any store access — a
/// malformed window is never partially applied.
pub fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<TimeWindow, ValidationError> {
    Ok(TimeWindow {
        start: parse_timestamp("start_timestamp", start)?,
        end: parse_timestamp("end_timestamp", end)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_must_be_present_and_bounded() {
        assert!(validate_message(None).is_err());
        assert!(validate_message(Some("   ")).is_err());
        assert_eq!(validate_message(Some("  hi  ")).unwrap(), "hi");

        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            validate_message(Some(&long)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn timestamps_accept_z_and_offset_forms() {
        let z = parse_timestamp("start_timestamp", Some("2024-03-01T09:00:00Z")).unwrap();
        let offset = parse_timestamp("start_timestamp", Some("2024-03-01T10:00:00+01:00")).unwrap();
        assert_eq!(z, offset);
    }

    #[test]
    fn malformed_window_is_rejected() {
        assert!(matches!(
            parse_window(Some("yesterday"), Some("2024-03-01T09:00:00Z")),
            Err(ValidationError::BadTimestamp { .. })
        ));
        assert!(matches!(
            parse_window(None, Some("2024-03-01T09:00:00Z")),
            Err(ValidationError::Missing { .. })
        ));
    }
}
