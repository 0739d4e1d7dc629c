use crate::types::traits::utils::{add_months, month_abbreviation};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Year(pub i32);

impl Display for Year {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// A calendar month, stored as `(year, month)` so that the derived ordering is chronological.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Month(pub i32, pub u32);
impl Month {
    pub fn year(self) -> i32 {
        self.0
    }
    pub fn month(self) -> u32 {
        self.1
    }
    /// The month containing `datetime`.
    pub fn of(datetime: DateTime<Utc>) -> Self {
        Self(datetime.year(), datetime.month())
    }

    /// Shifts the month by `delta` months, crossing year boundaries as needed.
    pub fn offset(self, delta: i32) -> Self {
        let (year, month) = add_months(self.0, self.1, delta);
        Self(year, month)
    }

    /// Lowercase English abbreviation used in archive file names, e.g. `"jan"`.
    pub fn abbreviation(self) -> &'static str {
        month_abbreviation(self.1)
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0, self.1)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StartEndDateTime {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
