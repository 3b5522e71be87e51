//! Inclusive calendar-day windows used by list filters.

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::ServiceError;

/// `start_date..=end_date`, either end optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DayRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ServiceError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ServiceError::ValidationError(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(Self { start, end })
    }

    /// First instant of the start day, in UTC.
    pub fn from_instant(&self) -> Option<DateTime<Utc>> {
        self.start.and_then(midnight)
    }

    /// First instant after the end day, in UTC. `None` past the calendar's end.
    pub fn until_instant(&self) -> Option<DateTime<Utc>> {
        self.end.and_then(|end| end.succ_opt()).and_then(midnight)
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

/// Trimmed search text, or `None` when blank.
pub(crate) fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert_matches!(
            DayRange::new(Some(day("2024-02-01")), Some(day("2024-01-01"))),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn end_day_is_inclusive() {
        let range = DayRange::new(Some(day("2024-01-01")), Some(day("2024-01-01"))).unwrap();
        assert_eq!(
            range.from_instant().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        assert_eq!(
            range.until_instant().unwrap().to_rfc3339(),
            "2024-01-02T00:00:00+00:00"
        );
    }

    #[test]
    fn open_ends_have_no_bound() {
        let range = DayRange::new(None, Some(NaiveDate::MAX)).unwrap();
        assert_eq!(range.from_instant(), None);
        assert_eq!(range.until_instant(), None);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(search_term(&Some("  ".to_string())), None);
        assert_eq!(search_term(&Some(" acme ".to_string())), Some("acme"));
    }
}
