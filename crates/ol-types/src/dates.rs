//! Snapshot-date parsing and validation.
//!
//! A snapshot date is the immutable generation key for one merge cycle; its
//! string form is strictly `YYYY-MM-DD`. Validation happens before any I/O,
//! so a rejected date leaves nothing on disk.

use chrono::NaiveDate;
use thiserror::Error;

pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum DateError {
    #[error("invalid snapshot date '{0}', expected YYYY-MM-DD")]
    Invalid(String),
    #[error("snapshot date {0} is in the future")]
    Future(NaiveDate),
}

/// Parse a strict `YYYY-MM-DD` snapshot date string.
pub fn parse_snapshot_date(input: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(input, SNAPSHOT_DATE_FORMAT)
        .map_err(|_| DateError::Invalid(input.to_string()))
}

/// Reject dates later than `today`. Querying or regenerating a snapshot for
/// a date that has not happened yet is always a caller error.
pub fn ensure_not_future(date: NaiveDate, today: NaiveDate) -> Result<(), DateError> {
    if date > today {
        return Err(DateError::Future(date));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_dates() {
        let d = parse_snapshot_date("2024-03-09").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn rejects_out_of_range_dates() {
        assert!(matches!(
            parse_snapshot_date("2024-13-40"),
            Err(DateError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_non_date_noise() {
        assert!(parse_snapshot_date("yesterday").is_err());
        assert!(parse_snapshot_date("2024/03/09").is_err());
        assert!(parse_snapshot_date("").is_err());
    }

    #[test]
    fn rejects_future_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        assert!(ensure_not_future(today, today).is_ok());
        assert!(matches!(
            ensure_not_future(tomorrow, today),
            Err(DateError::Future(_))
        ));
    }
}
