use crate::types::product::ProductType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One expected archive file: the period it covers and where it lives remotely and locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodRef {
    pub product: ProductType,
    pub timestamp: DateTime<Utc>,
    pub forecast_run: Option<NaiveDate>,
    pub remote_path: String,
    pub local_path: PathBuf,
}

impl fmt::Display for PeriodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.product,
            self.timestamp.format("%Y-%m-%d %H:%M")
        )
    }
}
