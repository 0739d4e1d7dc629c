pub mod error;
pub mod frame;
mod grib_reader;
mod netcdf_reader;

#[cfg(test)]
pub(crate) use netcdf_reader::fixtures;

use crate::raster::error::RasterError;
use crate::raster::frame::RasterFrame;
use crate::types::product::{ProductType, RasterFormat};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Decodes a downloaded file of `product` into a north-up [`RasterFrame`] stamped with
/// `timestamp`.
///
/// The decoder is chosen from the product's catalog format, not from the file contents.
/// This call blocks; run it on the blocking pool from async code.
pub fn open(
    path: &Path,
    product: ProductType,
    timestamp: DateTime<Utc>,
) -> Result<RasterFrame, RasterError> {
    match product.format() {
        RasterFormat::Grib2 => grib_reader::read(path, timestamp),
        RasterFormat::NetCdf => netcdf_reader::read(path, product.variable(), timestamp),
    }
}
