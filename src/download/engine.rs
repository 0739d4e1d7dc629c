use crate::download::error::{AttemptError, PeriodError, PeriodFailure, TransportError};
use crate::download::source::RemoteSource;
use crate::types::period::PeriodRef;
use crate::utils::is_cached;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// What to do with files that are already in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// Keep cached files and only transfer what is missing.
    #[default]
    SkipExisting,
    /// Transfer every file again, replacing cached copies.
    Overwrite,
    /// Transfer cached files again only when the server reports a modification time that
    /// differs from the cached copy's.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Outcome of downloading a range, in the order the periods were requested.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Periods whose file is now in the cache, whether transferred or already present.
    pub downloaded: Vec<PeriodRef>,
    pub failures: Vec<PeriodFailure>,
    /// Number of files actually transferred.
    pub transfers: usize,
}

impl DownloadReport {
    /// Local paths of all cached periods, in request order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.downloaded
            .iter()
            .map(|period| period.local_path.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Outcome {
    Cached(PeriodRef),
    Transferred(PeriodRef),
    Failed(PeriodFailure),
}

/// Fetches periods into the local cache with retries, atomic writes and bounded parallelism.
pub struct DownloadEngine {
    source: Arc<dyn RemoteSource>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl DownloadEngine {
    pub fn new(source: Arc<dyn RemoteSource>, policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            source,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    pub fn source(&self) -> &Arc<dyn RemoteSource> {
        &self.source
    }

    /// Downloads `periods`, never stopping at a failed period.
    ///
    /// Each file is written to a temporary file next to its destination and only renamed into
    /// place once it is non-empty and matches the announced length. Cancelling `cancel` aborts
    /// transfers in flight and marks the remaining periods as [`PeriodError::Cancelled`].
    ///
    /// Periods sharing a local path (climatologies across years) are transferred once; the
    /// repeats are resolved against the cache after the first copy has landed.
    pub async fn fetch(
        &self,
        periods: Vec<PeriodRef>,
        mode: DownloadMode,
        cancel: &CancellationToken,
    ) -> DownloadReport {
        let mut seen = HashSet::new();
        let (first, repeats): (Vec<_>, Vec<_>) = periods
            .into_iter()
            .enumerate()
            .partition(|(_, period)| seen.insert(period.local_path.clone()));
        if !repeats.is_empty() {
            debug!("{} periods share a file with an earlier period", repeats.len());
        }

        let mut outcomes = self.fetch_all(first, mode, cancel).await;
        outcomes.extend(
            self.fetch_all(repeats, DownloadMode::SkipExisting, cancel).await,
        );
        outcomes.sort_by_key(|(index, _)| *index);

        let report = outcomes
            .into_iter()
            .fold(DownloadReport::default(), |mut report, (_, outcome)| {
                match outcome {
                    Outcome::Cached(period) => report.downloaded.push(period),
                    Outcome::Transferred(period) => {
                        report.transfers += 1;
                        report.downloaded.push(period);
                    }
                    Outcome::Failed(failure) => report.failures.push(failure),
                }
                report
            });
        info!(
            "Downloaded {} files ({} transferred), {} failed",
            report.downloaded.len(),
            report.transfers,
            report.failures.len()
        );
        report
    }

    async fn fetch_all(
        &self,
        periods: Vec<(usize, PeriodRef)>,
        mode: DownloadMode,
        cancel: &CancellationToken,
    ) -> Vec<(usize, Outcome)> {
        stream::iter(periods)
            .map(|(index, period)| async move {
                (index, self.fetch_one(period, mode, cancel).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn fetch_one(
        &self,
        period: PeriodRef,
        mode: DownloadMode,
        cancel: &CancellationToken,
    ) -> Outcome {
        if mode != DownloadMode::Overwrite && is_cached(&period.local_path).await {
            let keep = match mode {
                DownloadMode::Update => cancel.is_cancelled() || self.is_current(&period).await,
                _ => true,
            };
            if keep {
                debug!("Cache hit for {} at {:?}", period, period.local_path);
                return Outcome::Cached(period);
            }
        }
        if cancel.is_cancelled() {
            return Outcome::Failed(PeriodFailure {
                period,
                reason: PeriodError::Cancelled,
            });
        }
        match self.transfer_with_retry(&period, cancel).await {
            Ok(()) => Outcome::Transferred(period),
            Err(reason) => {
                warn!("Giving up on {}: {}", period, reason);
                Outcome::Failed(PeriodFailure { period, reason })
            }
        }
    }

    /// Whether the cached copy of `period` carries the server's modification time.
    ///
    /// When the server cannot tell, the cached copy is kept.
    async fn is_current(&self, period: &PeriodRef) -> bool {
        let remote = match self.source.last_modified(&period.remote_path).await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                debug!("No modification time for {}, keeping cached copy", period);
                return true;
            }
            Err(e) => {
                warn!("Could not check {} for updates: {}", period, e);
                return true;
            }
        };
        let local = local_modified(&period.local_path).await;
        if local.map(|t| t.timestamp()) == Some(remote.timestamp()) {
            return true;
        }
        info!(
            "{} changed on the server ({} vs cached {:?}), downloading again",
            period, remote, local
        );
        false
    }

    async fn transfer_with_retry(
        &self,
        period: &PeriodRef,
        cancel: &CancellationToken,
    ) -> Result<(), PeriodError> {
        let url = self.source.url(&period.remote_path);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(PeriodError::Cancelled),
                result = self.attempt(period) => result,
            };

            match result {
                Ok(bytes) => {
                    info!("Stored {} bytes from {} at {:?}", bytes, url, period.local_path);
                    return Ok(());
                }
                Err(AttemptError::Transport(TransportError::NotFound(url))) => {
                    return Err(PeriodError::NotFound(url));
                }
                Err(e) if attempt >= max_attempts => {
                    return Err(PeriodError::Transfer {
                        url,
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt, max_attempts, url, e, delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(PeriodError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = delay.saturating_mul(2).min(self.policy.max_backoff);
                }
            }
        }
    }

    /// One transfer into a temporary file, promoted to `local_path` only when verified.
    /// Dropping the returned future at any point removes the temporary file.
    async fn attempt(&self, period: &PeriodRef) -> Result<u64, AttemptError> {
        let remote = self.source.fetch(&period.remote_path).await?;

        let dir = period.local_path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AttemptError::TempFile(dir.to_path_buf(), e))?;
        let temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| AttemptError::TempFile(dir.to_path_buf(), e))?;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut body = remote.body;
        let mut received = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk =
                chunk.map_err(|e| TransportError::Body(self.source.url(&period.remote_path), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AttemptError::TempFile(temp_path.to_path_buf(), e))?;
            received += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AttemptError::TempFile(temp_path.to_path_buf(), e))?;
        file.sync_all()
            .await
            .map_err(|e| AttemptError::TempFile(temp_path.to_path_buf(), e))?;
        let file = file.into_std().await;
        if let Some(modified) = remote.last_modified {
            file.set_modified(modified.into())
                .map_err(|e| AttemptError::TempFile(temp_path.to_path_buf(), e))?;
        }
        drop(file);

        if received == 0 {
            return Err(AttemptError::Empty);
        }
        if let Some(expected) = remote.content_length {
            if expected != received {
                return Err(AttemptError::LengthMismatch { expected, received });
            }
        }
        temp_path
            .persist(&period.local_path)
            .map_err(|e| AttemptError::Persist(period.local_path.clone(), e.error))?;
        Ok(received)
    }
}

async fn local_modified(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok().map(DateTime::<Utc>::from)
}
