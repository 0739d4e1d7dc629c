//! This module provides the main entry point of the crate: a client that downloads MERGE
//! rainfall files from the CPTEC archive into a local cache and turns them into time series.

use crate::clip::clip;
use crate::config::{self, Settings};
use crate::download::engine::{DownloadEngine, DownloadMode, DownloadReport, RetryPolicy};
use crate::download::error::{PeriodError, PeriodFailure};
use crate::download::source::{HttpSource, RemoteSource};
use crate::error::MergeError;
use crate::geometry::Geometry;
use crate::paths::{product_dir, resolve};
use crate::raster;
use crate::series::{reduce, TimeSeries};
use crate::types::date_range::DateRange;
use crate::types::period::PeriodRef;
use crate::types::product::ProductType;
use crate::utils::{ensure_cache_dir_exists, is_cached};
use bon::bon;
use futures_util::{stream, StreamExt};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;

/// Result of [`MergeDownloader::build_series`].
#[derive(Debug)]
pub struct SeriesReport {
    /// One entry per period that produced a value, in ascending time order.
    pub series: TimeSeries,
    /// Periods that could not be downloaded or decoded.
    pub failures: Vec<PeriodFailure>,
}

enum Ingested {
    Value(PeriodRef, f64),
    Empty(PeriodRef),
    Failed(PeriodFailure),
}

/// The main client for the MERGE archive.
///
/// Files are cached under `root_folder/<PRODUCT_NAME>/` with their archive file names, so
/// repeated calls only transfer what is missing.
///
/// Create an instance with [`MergeDownloader::new()`] to use the process-wide settings from
/// [`config::initialize`] (or the platform cache directory when none are set), or with
/// [`MergeDownloader::with_settings()`] for explicit settings.
///
/// # Examples
///
/// ```rust,no_run
/// # use merge_downloader::{DateRange, MergeDownloader, MergeError, ProductType};
/// # async fn run() -> Result<(), MergeError> {
/// let client = MergeDownloader::new().await?;
/// let range = DateRange::new(ProductType::DailyRain, "2023-04-01", "2023-04-30")?;
///
/// let report = client.download().range(&range).call().await?;
/// for path in report.paths() {
///     println!("{}", path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct MergeDownloader {
    settings: Settings,
    engine: DownloadEngine,
}

#[bon]
impl MergeDownloader {
    /// Creates a client from the process-wide settings.
    ///
    /// Uses the settings installed with [`config::initialize`] or [`config::configure`]; when
    /// none are set, files are cached in the platform cache directory (e.g.
    /// `~/.cache/merge_downloader_cache` on Linux) and fetched from the CPTEC server.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::CacheDirResolution`] if no cache directory can be determined,
    /// [`MergeError::CacheDirCreation`] if it cannot be created and
    /// [`MergeError::HttpClient`] if the HTTP client cannot be built.
    pub async fn new() -> Result<Self, MergeError> {
        let settings = match config::current() {
            Some(settings) => settings,
            None => Settings::in_cache_dir()?,
        };
        Self::with_settings(settings).await
    }

    /// Creates a client with explicit settings, ignoring the process-wide ones.
    ///
    /// # Arguments
    ///
    /// * `settings` - Root folder, server address and retry/concurrency knobs.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::CacheDirCreation`] if the root folder cannot be created and
    /// [`MergeError::HttpClient`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use merge_downloader::{MergeDownloader, MergeError, Settings};
    /// # async fn run() -> Result<(), MergeError> {
    /// let settings = Settings::builder()
    ///     .root_folder("/data/merge")
    ///     .concurrency(8)
    ///     .build();
    /// let client = MergeDownloader::with_settings(settings).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_settings(settings: Settings) -> Result<Self, MergeError> {
        let source = HttpSource::new(settings.server_address(), settings.request_timeout())
            .map_err(MergeError::HttpClient)?;
        Self::with_source(settings, Arc::new(source)).await
    }

    /// Creates a client that reads from `source` instead of the HTTP archive.
    ///
    /// Useful for mirrors and tests; the server address in `settings` is ignored.
    pub async fn with_source(
        settings: Settings,
        source: Arc<dyn RemoteSource>,
    ) -> Result<Self, MergeError> {
        let root = settings.root_folder().to_path_buf();
        ensure_cache_dir_exists(&root)
            .await
            .map_err(|e| MergeError::CacheDirCreation(root, e))?;
        let policy = RetryPolicy {
            max_attempts: settings.max_attempts(),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        };
        let engine = DownloadEngine::new(source, policy, settings.concurrency());
        Ok(Self { settings, engine })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Lists the periods of `range` with their remote and local paths, without touching the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::EmptyRange`] if the range holds no period and
    /// [`MergeError::UnsupportedProduct`] for derived products.
    pub fn resolve(&self, range: &DateRange) -> Result<Vec<PeriodRef>, MergeError> {
        resolve(range, self.settings.root_folder())
    }

    /// Downloads every period of a range into the cache.
    ///
    /// Periods already cached are skipped unless `mode` is [`DownloadMode::Overwrite`], or
    /// [`DownloadMode::Update`] and the server holds a newer revision of the file.
    /// Transfers run concurrently, are retried with exponential backoff and are written
    /// atomically, so a cache file is either complete or absent. A period that cannot be
    /// fetched is reported in [`DownloadReport::failures`] without affecting the others.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.range(&DateRange)`: **Required.** Product and time span to fetch.
    /// * `.mode(DownloadMode)`: Optional. Defaults to [`DownloadMode::SkipExisting`].
    /// * `.cancel(CancellationToken)`: Optional. Cancelling the token stops transfers in flight
    ///   and reports the remaining periods as [`PeriodError::Cancelled`].
    ///
    /// # Returns
    ///
    /// A [`DownloadReport`] with the cached periods in request order and the failures.
    ///
    /// # Errors
    ///
    /// Only range-level problems are errors: [`MergeError::EmptyRange`] and
    /// [`MergeError::UnsupportedProduct`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use merge_downloader::{DateRange, DownloadMode, MergeDownloader, MergeError, ProductType};
    /// # async fn run() -> Result<(), MergeError> {
    /// let client = MergeDownloader::new().await?;
    /// let range = DateRange::new(ProductType::YearlyAccum, "2019", "2022")?;
    ///
    /// let report = client
    ///     .download()
    ///     .range(&range)
    ///     .mode(DownloadMode::Update)
    ///     .call()
    ///     .await?;
    /// for failure in &report.failures {
    ///     eprintln!("{}: {}", failure.period, failure.reason);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn download(
        &self,
        range: &DateRange,
        mode: Option<DownloadMode>,
        cancel: Option<CancellationToken>,
    ) -> Result<DownloadReport, MergeError> {
        let periods = self.resolve(range)?;
        let cancel = cancel.unwrap_or_default();
        info!(
            "Downloading {} {} periods from {} to {}",
            periods.len(),
            range.product(),
            range.start(),
            range.end()
        );
        Ok(self
            .engine
            .fetch(periods, mode.unwrap_or_default(), &cancel)
            .await)
    }

    /// Downloads a range and reduces every period to the mean rainfall over an area.
    ///
    /// Each file is decoded, masked to `geometry` when one is given and averaged over its valid
    /// cells. Periods whose area holds no valid cell produce no entry. Files that fail to
    /// download or decode are reported in [`SeriesReport::failures`] and skipped.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.range(&DateRange)`: **Required.** Product and time span.
    /// * `.geometry(&Geometry)`: Optional. Area of interest; without it the whole grid is used.
    /// * `.crop(bool)`: Optional. Crop frames to the geometry's bounding box before reducing.
    ///   Defaults to `true`; the result does not depend on it.
    /// * `.cancel(CancellationToken)`: Optional. Entries produced before cancellation are kept.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Geometry`] with [`crate::GeometryError::MissingCrs`] before any
    /// transfer if the geometry has no CRS, plus the range errors of
    /// [`MergeDownloader::download`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use merge_downloader::{Crs, DateRange, Geometry, MergeDownloader, MergeError, ProductType};
    /// # async fn run() -> Result<(), MergeError> {
    /// let client = MergeDownloader::new().await?;
    /// let range = DateRange::new(ProductType::DailyRain, "2023-04-01", "2023-04-30")?;
    /// let area = Geometry::rectangle((-47.5, -23.0), (-46.0, -22.0), Some(Crs::WGS84));
    ///
    /// let report = client
    ///     .build_series()
    ///     .range(&range)
    ///     .geometry(&area)
    ///     .call()
    ///     .await?;
    /// for (time, rain) in &report.series {
    ///     println!("{time}: {rain:.1} mm");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn build_series(
        &self,
        range: &DateRange,
        geometry: Option<&Geometry>,
        crop: Option<bool>,
        cancel: Option<CancellationToken>,
    ) -> Result<SeriesReport, MergeError> {
        if let Some(geometry) = geometry {
            geometry.require_crs()?;
        }
        let crop = crop.unwrap_or(true);
        let cancel = cancel.unwrap_or_default();
        let product = range.product();

        let periods = self.resolve(range)?;
        let download = self
            .engine
            .fetch(periods, DownloadMode::SkipExisting, &cancel)
            .await;

        let geometry = geometry.cloned().map(Arc::new);
        let outcomes: Vec<Ingested> = stream::iter(download.downloaded)
            .map(|period| {
                let geometry = geometry.clone();
                let cancel = cancel.clone();
                async move { ingest(period, product, geometry, crop, &cancel).await }
            })
            .buffered(self.settings.concurrency())
            .collect()
            .await;

        let mut series = TimeSeries::new(product.variable());
        let mut failures = download.failures;
        for outcome in outcomes {
            match outcome {
                Ingested::Value(period, value) => series.push(period.timestamp, value),
                Ingested::Empty(period) => {
                    debug!("No valid cells for {period}, leaving it out of the series")
                }
                Ingested::Failed(failure) => failures.push(failure),
            }
        }
        failures.sort_by_key(|failure| failure.period.timestamp);
        info!(
            "Built {} series with {} entries, {} periods failed",
            product,
            series.len(),
            failures.len()
        );
        Ok(SeriesReport { series, failures })
    }

    /// Whether the file of `period` is already cached.
    pub async fn is_downloaded(&self, period: &PeriodRef) -> bool {
        is_cached(&period.local_path).await
    }

    /// Asks the archive whether the file of `period` exists, without downloading it.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::RemoteCheck`] if the server cannot be reached.
    pub async fn remote_file_exists(&self, period: &PeriodRef) -> Result<bool, MergeError> {
        self.engine
            .source()
            .exists(&period.remote_path)
            .await
            .map_err(|e| MergeError::RemoteCheck(period.remote_path.clone(), e))
    }

    /// Deletes cached files of one product, or of every product when `product` is `None`.
    ///
    /// Other content of the root folder is left alone.
    pub async fn clear_cache(&self, product: Option<ProductType>) -> Result<(), MergeError> {
        let products = match product {
            Some(product) => vec![product],
            None => ProductType::ALL.to_vec(),
        };
        for product in products {
            let dir = product_dir(self.settings.root_folder(), product);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => info!("Removed cached {} files in {}", product, dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(MergeError::CacheDeletion(dir, e)),
            }
        }
        Ok(())
    }
}

async fn ingest(
    period: PeriodRef,
    product: ProductType,
    geometry: Option<Arc<Geometry>>,
    crop: bool,
    cancel: &CancellationToken,
) -> Ingested {
    if cancel.is_cancelled() {
        return Ingested::Failed(PeriodFailure {
            period,
            reason: PeriodError::Cancelled,
        });
    }
    let path = period.local_path.clone();
    let timestamp = period.timestamp;
    let result = task::spawn_blocking(move || {
        let frame = raster::open(&path, product, timestamp)?;
        let frame = match geometry {
            Some(geometry) => clip(&frame, &geometry, crop)?,
            None => frame,
        };
        Ok::<Option<f64>, MergeError>(reduce(&frame))
    })
    .await;

    match result {
        Ok(Ok(Some(value))) => Ingested::Value(period, value),
        Ok(Ok(None)) => Ingested::Empty(period),
        Ok(Err(MergeError::Raster(e))) => {
            warn!("Could not decode {}: {}", period.local_path.display(), e);
            let path = period.local_path.clone();
            Ingested::Failed(PeriodFailure {
                period,
                reason: PeriodError::CorruptFile(path, e),
            })
        }
        Ok(Err(e)) => {
            warn!("Skipping {period}: {e}");
            Ingested::Failed(PeriodFailure {
                period,
                reason: PeriodError::Ingest(e.to_string()),
            })
        }
        Err(e) => {
            warn!("Decoding task for {period} failed: {e}");
            Ingested::Failed(PeriodFailure {
                period,
                reason: PeriodError::Ingest(e.to_string()),
            })
        }
    }
}
