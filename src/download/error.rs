use crate::raster::error::RasterError;
use crate::types::period::PeriodRef;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single request against the archive.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Remote file {0} does not exist")]
    NotFound(String),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Reading the body of {0} failed")]
    Body(String, #[source] std::io::Error),
}

/// Failure of a single transfer attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed writing temporary file in '{0}'")]
    TempFile(PathBuf, #[source] std::io::Error),

    #[error("Incomplete transfer: expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("Transfer produced an empty file")]
    Empty,

    #[error("Failed to move download into '{0}'")]
    Persist(PathBuf, #[source] std::io::Error),
}

/// Why one period of a range did not make it into the result.
#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("Remote file {0} does not exist")]
    NotFound(String),

    #[error("Transfer of {url} failed after {attempts} attempts")]
    Transfer {
        url: String,
        attempts: u32,
        #[source]
        source: AttemptError,
    },

    #[error("Failed to decode '{0}'")]
    CorruptFile(PathBuf, #[source] RasterError),

    #[error("Failed to process downloaded file: {0}")]
    Ingest(String),

    #[error("Cancelled")]
    Cancelled,
}

/// A period paired with the reason it failed.
#[derive(Debug)]
pub struct PeriodFailure {
    pub period: PeriodRef,
    pub reason: PeriodError,
}
