use crate::types::traits::types::{Month, StartEndDateTime, Year};
use crate::types::traits::utils::days_in_month;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Anything that denotes an instant or a span of calendar time.
///
/// A date denotes the whole day, a [`Month`] the whole month and so on. When used as the
/// start of a [`crate::DateRange`] the beginning of the span counts, when used as the end the
/// end of the span counts, so `("2022-01", "2022-12")` covers the whole of 2022.
pub trait AnyDateTime {
    fn get_datetime_range(self) -> Option<StartEndDateTime>;
}

impl AnyDateTime for NaiveDateTime {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let dt = Utc.from_utc_datetime(&self);
        Some(StartEndDateTime { start: dt, end: dt })
    }
}

impl AnyDateTime for DateTime<Local> {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let dt = self.with_timezone(&Utc);
        Some(StartEndDateTime { start: dt, end: dt })
    }
}

impl AnyDateTime for DateTime<Utc> {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        Some(StartEndDateTime {
            start: self,
            end: self,
        })
    }
}

impl AnyDateTime for DateTime<FixedOffset> {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let dt = self.with_timezone(&Utc);
        Some(StartEndDateTime { start: dt, end: dt })
    }
}

impl AnyDateTime for NaiveDate {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let start = self
            .and_hms_opt(0, 0, 0)
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))?;
        let end = self
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))?;
        Some(StartEndDateTime { start, end })
    }
}

impl AnyDateTime for &str {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        self.to_string().get_datetime_range()
    }
}

impl AnyDateTime for &String {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        self.as_str().get_datetime_range()
    }
}

impl AnyDateTime for String {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let text = self.trim();
        // Try full UTC parse
        if let Ok(dt) = text.parse::<DateTime<Utc>>() {
            return dt.get_datetime_range();
        }
        // Try fixed offset (e.g., +02:00)
        if let Ok(dt) = text.parse::<DateTime<FixedOffset>>() {
            return dt.get_datetime_range();
        }
        // Try naive datetime
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(text, format) {
                return naive_dt.get_datetime_range();
            }
        }
        // Try naive date
        for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
            if let Ok(naive_date) = NaiveDate::parse_from_str(text, format) {
                return naive_date.get_datetime_range();
            }
        }
        // Year-month, e.g. "2022-01" or "2022/01"
        if let Some((year, month)) = text.split_once(|c: char| c == '-' || c == '/') {
            if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
                if year.to_string().len() == 4 {
                    return Month(year, month).get_datetime_range();
                }
            }
        }
        // Bare year
        if text.len() == 4 {
            if let Ok(year) = text.parse::<i32>() {
                return Year(year).get_datetime_range();
            }
        }
        None
    }
}

impl AnyDateTime for Year {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let start_naive = NaiveDate::from_ymd_opt(self.0, 1, 1)?.and_hms_opt(0, 0, 0)?;
        let start = DateTime::<Utc>::from_naive_utc_and_offset(start_naive, Utc);
        let end_naive =
            NaiveDate::from_ymd_opt(self.0, 12, 31)?.and_hms_micro_opt(23, 59, 59, 999_999)?;
        let end = DateTime::<Utc>::from_naive_utc_and_offset(end_naive, Utc);
        Some(StartEndDateTime { start, end })
    }
}

impl AnyDateTime for Month {
    fn get_datetime_range(self) -> Option<StartEndDateTime> {
        let year = self.year();
        let month = self.month();

        let start_naive = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
        let start = DateTime::<Utc>::from_naive_utc_and_offset(start_naive, Utc);

        let end_naive = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)?)?
            .and_hms_micro_opt(23, 59, 59, 999_999)?;
        let end = DateTime::<Utc>::from_naive_utc_and_offset(end_naive, Utc);

        Some(StartEndDateTime { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_year_month_string() {
        let range = "2022-12".get_datetime_range().unwrap();
        assert_eq!(range.start.date_naive(), NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        assert_eq!(range.end.date_naive(), NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());
        assert_eq!(range.end.hour(), 23);
    }

    #[test]
    fn test_slash_date_and_bare_year() {
        let day = "2022/04/14".get_datetime_range().unwrap();
        assert_eq!(day.start.day(), 14);
        assert_eq!(day.start.month(), 4);

        let year = "2021".get_datetime_range().unwrap();
        assert_eq!(year.start.ordinal(), 1);
        assert_eq!(year.end.month(), 12);
        assert_eq!(year.end.day(), 31);
    }

    #[test]
    fn test_naive_datetime_string() {
        let range = "2023-05-22T06:00:00".get_datetime_range().unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(range.start.hour(), 6);
    }

    #[test]
    fn test_invalid_strings() {
        assert!("not a date".get_datetime_range().is_none());
        assert!("2022-13".get_datetime_range().is_none());
        assert!("22-01".get_datetime_range().is_none());
    }
}
