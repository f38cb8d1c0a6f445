// Query time window
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::InvalidRangeError;

/// Calendar dates chosen by the viewer, both inclusive, in display time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive UTC range handed to the telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub single_day: bool,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Spans `[start 00:00:00, end 23:59:59]` in `display_offset`, converted to UTC.
    ///
    /// A future end date is allowed; it simply matches no records.
    pub fn resolve(&self, display_offset: FixedOffset) -> Result<TimeWindow, InvalidRangeError> {
        if self.end < self.start {
            return Err(InvalidRangeError {
                start: self.start,
                end: self.end,
            });
        }

        let start_local = self.start.and_time(NaiveTime::default());
        let end_local = self
            .end
            .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default());

        // A fixed offset has exactly one mapping for every local time.
        let start_utc = display_offset
            .from_local_datetime(&start_local)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&start_local));
        let end_utc = display_offset
            .from_local_datetime(&end_local)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&end_local));

        Ok(TimeWindow {
            start_utc,
            end_utc,
            single_day: self.start == self.end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    #[test]
    fn test_window_covers_whole_local_days() {
        let window = DateRange::new(date(2024, 7, 1), date(2024, 7, 3))
            .resolve(ist())
            .unwrap();

        assert_eq!(window.start_utc, Utc.with_ymd_and_hms(2024, 6, 30, 18, 30, 0).unwrap());
        assert_eq!(window.end_utc, Utc.with_ymd_and_hms(2024, 7, 3, 18, 29, 59).unwrap());
        assert!(!window.single_day);
    }

    #[test]
    fn test_window_in_utc_display_zone() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let window = DateRange::new(date(2024, 1, 15), date(2024, 1, 15))
            .resolve(utc)
            .unwrap();

        assert_eq!(window.start_utc, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(window.end_utc, Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap());
        assert!(window.single_day);
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let err = DateRange::new(date(2024, 7, 3), date(2024, 7, 1))
            .resolve(ist())
            .unwrap_err();
        assert_eq!(err.start, date(2024, 7, 3));
        assert_eq!(err.end, date(2024, 7, 1));
    }

    #[test]
    fn test_future_end_date_is_not_clamped() {
        let window = DateRange::new(date(2024, 7, 1), date(2099, 12, 31))
            .resolve(ist())
            .unwrap();
        assert_eq!(window.end_utc, Utc.with_ymd_and_hms(2099, 12, 31, 18, 29, 59).unwrap());
    }
}
