mod clip;
pub mod config;
mod crs;
mod download;
mod error;
mod geometry;
mod merge_downloader;
pub mod paths;
mod raster;
mod series;
mod types;
mod utils;

pub use error::MergeError;
pub use merge_downloader::*;

pub use config::{initialize, reset_configuration, Settings};

pub use types::date_range::{monthly_windows, DateRange};
pub use types::period::PeriodRef;
pub use types::product::{Cadence, NamingRule, ProductType, RasterFormat};
pub use types::traits::any_datetime::AnyDateTime;
pub use types::traits::types::Month;
pub use types::traits::types::Year;

pub use download::engine::{DownloadEngine, DownloadMode, DownloadReport, RetryPolicy};
pub use download::error::{AttemptError, PeriodError, PeriodFailure, TransportError};
pub use download::source::{ByteStream, HttpSource, RemoteFile, RemoteSource};

pub use raster::error::{GridError, RasterError};
pub use raster::frame::{GeoTransform, RasterFrame};
pub use raster::open as open_raster;

pub use clip::clip;
pub use crs::{Crs, CrsTransform};
pub use geometry::{Geometry, GeometryError};
pub use series::{reduce, TimeSeries};
