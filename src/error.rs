use crate::geometry::GeometryError;
use crate::raster::error::RasterError;
use crate::types::product::ProductType;
use chrono::{DateTime, Utc};
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Range start {start} lies after its end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Range {start} to {end} contains no {product} periods")]
    EmptyRange {
        product: ProductType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Could not interpret {0} as a date")]
    DateParsing(String),

    #[error("Unknown product '{0}'")]
    UnknownProduct(String),

    #[error("Product {0} is not published on the archive")]
    UnsupportedProduct(ProductType),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Request for {0} failed")]
    RemoteCheck(String, #[source] crate::download::error::TransportError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to delete cache '{0}'")]
    CacheDeletion(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing '{0}'")]
    ExportIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing '{0}'")]
    ExportPolars(PathBuf, #[source] PolarsError),

    #[error("Failed building the series table")]
    DataFrame(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
