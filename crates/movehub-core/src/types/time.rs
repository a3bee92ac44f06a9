//! Checked date arithmetic for day-count settings and request parameters.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::AppError;

/// The instant `days` days before `now`.
///
/// Fails with a validation error when the result is outside the range
/// `DateTime<Utc>` can represent.
pub fn days_before(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, AppError> {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| AppError::validation(format!("{days} days is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_days_before_subtracts_whole_days() {
        let now = Utc::now();
        assert_eq!(days_before(now, 2).unwrap(), now - TimeDelta::days(2));
    }

    #[test]
    fn test_days_before_rejects_unrepresentable_results() {
        let err = days_before(Utc::now(), 1_000_000_000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(days_before(Utc::now(), i64::MAX).is_err());
    }
}
