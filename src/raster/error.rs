use std::path::PathBuf;
use thiserror::Error;

/// A grid that cannot be laid out as a regular north-up raster.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Grid holds {found} values but its axes describe {expected}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("The {0} axis needs at least two distinct coordinates")]
    DegenerateAxis(&'static str),

    #[error("The {0} axis is not regularly spaced")]
    IrregularAxis(&'static str),

    #[error("Grid points do not form a complete {width}x{height} lattice")]
    IncompleteLattice { width: usize, height: usize },
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Failed to open raster file '{0}'")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode GRIB2 file '{0}': {1}")]
    Grib(PathBuf, String),

    #[error("GRIB2 file '{0}' contains no fields")]
    NoMessages(PathBuf),

    #[error("Failed to read NetCDF file '{0}'")]
    NetCdf(PathBuf, #[source] netcdf::Error),

    #[error("Variable '{1}' not found in '{0}'")]
    MissingVariable(PathBuf, String),

    #[error("Variable '{1}' in '{0}' is not a 2-D grid")]
    UnexpectedShape(PathBuf, String),

    #[error("Invalid grid in '{0}'")]
    Grid(PathBuf, #[source] GridError),
}
