//! Turns products and period timestamps into remote archive paths and local cache paths.

use crate::error::MergeError;
use crate::types::date_range::DateRange;
use crate::types::period::PeriodRef;
use crate::types::product::ProductType;
use crate::types::traits::types::Month;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::path::{Path, PathBuf};

/// Renders the remote path of one period, e.g.
/// `/modelos/tempo/MERGE/GPM/DAILY/2023/04/MERGE_CPTEC_20230415.grib2`.
///
/// `forecast_run` is only consulted by forecast products and defaults to the period's date.
///
/// # Errors
///
/// Returns [`MergeError::UnsupportedProduct`] for products that are not published on the archive.
pub fn remote_path(
    product: ProductType,
    timestamp: DateTime<Utc>,
    forecast_run: Option<NaiveDate>,
) -> Result<String, MergeError> {
    let rule = product
        .naming_rule()
        .ok_or(MergeError::UnsupportedProduct(product))?;
    let run = forecast_run.unwrap_or_else(|| timestamp.date_naive());
    let relative = rule
        .template
        .replace("{ryyyy}", &format!("{:04}", run.year()))
        .replace("{rmm}", &format!("{:02}", run.month()))
        .replace("{rdd}", &format!("{:02}", run.day()))
        .replace("{yyyy}", &format!("{:04}", timestamp.year()))
        .replace("{mm}", &format!("{:02}", timestamp.month()))
        .replace("{dd}", &format!("{:02}", timestamp.day()))
        .replace("{hh}", &format!("{:02}", timestamp.hour()))
        .replace("{mon}", Month::of(timestamp).abbreviation());
    Ok(format!("{}/{}", rule.root.trim_end_matches('/'), relative))
}

/// The final path segment of [`remote_path`].
pub fn file_name(
    product: ProductType,
    timestamp: DateTime<Utc>,
    forecast_run: Option<NaiveDate>,
) -> Result<String, MergeError> {
    let path = remote_path(product, timestamp, forecast_run)?;
    Ok(path.rsplit('/').next().unwrap_or(&path).to_string())
}

/// Where a period is cached: `root/<PRODUCT_NAME>/<file name>`.
pub fn local_path(
    root: &Path,
    product: ProductType,
    timestamp: DateTime<Utc>,
    forecast_run: Option<NaiveDate>,
) -> Result<PathBuf, MergeError> {
    Ok(product_dir(root, product).join(file_name(product, timestamp, forecast_run)?))
}

pub(crate) fn product_dir(root: &Path, product: ProductType) -> PathBuf {
    root.join(product.folder_name())
}

/// Resolves every period of `range` into a [`PeriodRef`], in ascending timestamp order.
pub fn resolve(range: &DateRange, root: &Path) -> Result<Vec<PeriodRef>, MergeError> {
    let product = range.product();
    let forecast_run = range.forecast_run();
    range
        .periods()?
        .into_iter()
        .map(|timestamp| {
            let remote_path = remote_path(product, timestamp, forecast_run)?;
            let file_name = remote_path.rsplit('/').next().unwrap_or(&remote_path);
            let local_path = product_dir(root, product).join(file_name);
            Ok(PeriodRef {
                product,
                timestamp,
                forecast_run,
                remote_path,
                local_path,
            })
        })
        .collect()
}
