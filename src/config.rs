//! Process-wide settings: where the cache lives, which server to talk to and how hard to try.

use crate::error::MergeError;
use crate::utils::get_cache_dir;
use bon::Builder;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://ftp.cptec.inpe.br";

static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Settings for a [`crate::MergeDownloader`].
///
/// # Examples
///
/// ```
/// use merge_downloader::Settings;
/// use std::time::Duration;
///
/// let settings = Settings::builder()
///     .root_folder("/tmp/merge")
///     .max_attempts(3)
///     .initial_backoff(Duration::from_millis(500))
///     .build();
/// assert_eq!(settings.server_address(), "http://ftp.cptec.inpe.br");
/// assert_eq!(settings.concurrency(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct Settings {
    /// Folder holding one sub folder per product.
    #[builder(into)]
    root_folder: PathBuf,
    /// Scheme and host of the archive, without a trailing path.
    #[builder(into, default = DEFAULT_SERVER.to_string())]
    server_address: String,
    /// Total attempts per file, including the first one.
    #[builder(default = 5)]
    max_attempts: u32,
    #[builder(default = Duration::from_secs(1))]
    initial_backoff: Duration,
    #[builder(default = Duration::from_secs(30))]
    max_backoff: Duration,
    #[builder(default = Duration::from_secs(120))]
    request_timeout: Duration,
    /// Number of files transferred or decoded at the same time.
    #[builder(default = 4)]
    concurrency: usize,
}

impl Settings {
    /// Settings rooted in the platform cache directory, e.g. `~/.cache/merge_downloader_cache`.
    pub fn in_cache_dir() -> Result<Self, MergeError> {
        let root = get_cache_dir().map_err(MergeError::CacheDirResolution)?;
        Ok(Settings::builder().root_folder(root).build())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Sets the process-wide root folder and server address, keeping the defaults for everything
/// else. Clients created afterwards with [`crate::MergeDownloader::new`] pick these up.
pub fn initialize(root_folder: impl Into<PathBuf>, server_address: impl Into<String>) -> Settings {
    let settings = Settings::builder()
        .root_folder(root_folder)
        .server_address(server_address)
        .build();
    configure(settings.clone());
    settings
}

/// Replaces the process-wide settings.
pub fn configure(settings: Settings) {
    info!(
        "Using cache folder {} and server {}",
        settings.root_folder.display(),
        settings.server_address
    );
    *SETTINGS.write().unwrap_or_else(PoisonError::into_inner) = Some(settings);
}

/// The process-wide settings, if any have been set.
pub fn current() -> Option<Settings> {
    SETTINGS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Forgets the process-wide settings; new clients fall back to the platform cache directory
/// and the default server.
pub fn reset_configuration() {
    *SETTINGS.write().unwrap_or_else(PoisonError::into_inner) = None;
}
