use crate::error::MergeError;
use crate::types::product::{Cadence, ProductType};
use crate::types::traits::any_datetime::AnyDateTime;
use crate::types::traits::types::Month;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::fmt::Debug;

/// Day of the month that labels a monthly period.
pub const MONTHLY_ANCHOR_DAY: u32 = 26;
/// Hour of the day that labels a daily period.
pub const DAILY_ANCHOR_HOUR: u32 = 12;

/// A request for one product over a span of time.
///
/// Start and end are normalised on construction: the start input contributes the beginning of
/// the span it denotes and the end input the end of its span.
///
/// # Examples
///
/// ```
/// use merge_downloader::{DateRange, ProductType};
///
/// let range = DateRange::new(ProductType::MonthlyAccumYearly, "2022-01", "2022-12").unwrap();
/// let periods = range.periods().unwrap();
/// assert_eq!(periods.len(), 12);
/// assert_eq!(periods[0].to_string(), "2022-01-26 00:00:00 UTC");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    product: ProductType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    forecast_run: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range for `product` from `start` to `end`, both inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DateParsing`] if either input cannot be understood and
    /// [`MergeError::InvalidRange`] if the normalised start lies after the normalised end.
    pub fn new<S, E>(product: ProductType, start: S, end: E) -> Result<Self, MergeError>
    where
        S: AnyDateTime + Debug,
        E: AnyDateTime + Debug,
    {
        let start_label = format!("{start:?}");
        let end_label = format!("{end:?}");
        let start = start
            .get_datetime_range()
            .ok_or(MergeError::DateParsing(start_label))?
            .start;
        let end = end
            .get_datetime_range()
            .ok_or(MergeError::DateParsing(end_label))?
            .end;
        if start > end {
            return Err(MergeError::InvalidRange { start, end });
        }
        Ok(Self {
            product,
            start,
            end,
            forecast_run: None,
        })
    }

    /// Range covering the `n` months that end with the month of `reference`. `n = 0` is
    /// treated as 1.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DateParsing`] if `reference` cannot be understood or the first
    /// month falls outside the supported calendar, and [`MergeError::InvalidRange`] if `n`
    /// reaches back further than a month offset can express.
    pub fn last_n_months<R>(product: ProductType, reference: R, n: u32) -> Result<Self, MergeError>
    where
        R: AnyDateTime + Debug,
    {
        let label = format!("{reference:?}");
        let reference = reference
            .get_datetime_range()
            .ok_or(MergeError::DateParsing(label))?
            .end;
        let last = Month::of(reference);
        let back = i32::try_from(n.max(1)).map_err(|_| MergeError::InvalidRange {
            start: DateTime::<Utc>::MIN_UTC,
            end: reference,
        })?;
        let first = last.offset(1 - back);
        Self::new(product, first, last)
    }

    /// Sets the forecast run (initialisation date) used by forecast products. Defaults to the
    /// start date of the range.
    pub fn with_forecast_run(mut self, forecast_run: NaiveDate) -> Self {
        self.forecast_run = Some(forecast_run);
        self
    }

    pub fn product(&self) -> ProductType {
        self.product
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The forecast run for forecast products, `None` for everything else.
    pub fn forecast_run(&self) -> Option<NaiveDate> {
        if !self.product.is_forecast() {
            return None;
        }
        Some(self.forecast_run.unwrap_or_else(|| self.start.date_naive()))
    }

    /// Expands the range into one timestamp per period at the product's cadence.
    ///
    /// The result is strictly ascending and free of duplicates. Daily periods are labelled at
    /// noon, monthly periods on day 26 at midnight, yearly periods on January 1st and hourly
    /// periods on every whole hour inside the range.
    ///
    /// Monthly and yearly ranges select every calendar month (year) they touch, whatever the
    /// day of the month, so even a single-day range yields the period containing that day.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::EmptyRange`] if no period falls inside the range. With the
    /// whole-month and whole-year selection above, only sub-hour ranges of hourly products
    /// between two whole hours can be empty.
    pub fn periods(&self) -> Result<Vec<DateTime<Utc>>, MergeError> {
        let periods = match self.product.cadence() {
            Cadence::Daily => self.daily_periods(),
            Cadence::Monthly => self.monthly_periods(),
            Cadence::Yearly => self.yearly_periods(),
            Cadence::Hourly => self.hourly_periods(),
        };
        if periods.is_empty() {
            return Err(MergeError::EmptyRange {
                product: self.product,
                start: self.start,
                end: self.end,
            });
        }
        Ok(periods)
    }

    fn daily_periods(&self) -> Vec<DateTime<Utc>> {
        self.start
            .date_naive()
            .iter_days()
            .take_while(|day| *day <= self.end.date_naive())
            .filter_map(|day| day.and_hms_opt(DAILY_ANCHOR_HOUR, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .collect()
    }

    fn monthly_periods(&self) -> Vec<DateTime<Utc>> {
        let last = Month::of(self.end);
        let mut month = Month::of(self.start);
        let mut periods = Vec::new();
        while month <= last {
            if let Some(stamp) = anchored(month.year(), month.month(), MONTHLY_ANCHOR_DAY) {
                periods.push(stamp);
            }
            month = month.offset(1);
        }
        periods
    }

    fn yearly_periods(&self) -> Vec<DateTime<Utc>> {
        (self.start.year()..=self.end.year())
            .filter_map(|year| anchored(year, 1, 1))
            .collect()
    }

    fn hourly_periods(&self) -> Vec<DateTime<Utc>> {
        let Some(mut hour) = self
            .start
            .with_nanosecond(0)
            .and_then(|dt| dt.with_second(0))
            .and_then(|dt| dt.with_minute(0))
        else {
            return Vec::new();
        };
        if hour < self.start {
            hour += Duration::hours(1);
        }
        let mut periods = Vec::new();
        while hour <= self.end {
            periods.push(hour);
            hour += Duration::hours(1);
        }
        periods
    }
}

fn anchored(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Splits `start..=end` into consecutive windows of `step` months. A trailing partial window
/// is dropped.
pub fn monthly_windows(start: Month, end: Month, step: u32) -> Vec<(Month, Month)> {
    let step = step.max(1) as i32;
    let mut windows = Vec::new();
    let mut first = start;
    loop {
        let last = first.offset(step - 1);
        if last > end {
            break;
        }
        windows.push((first, last));
        first = last.offset(1);
    }
    windows
}
