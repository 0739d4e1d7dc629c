use crate::crs::Crs;
use crate::raster::error::RasterError;
use crate::raster::frame::RasterFrame;
use chrono::{DateTime, Utc};
use log::debug;
use std::path::Path;

const LON_NAMES: [&str; 3] = ["lon", "longitude", "x"];
const LAT_NAMES: [&str; 3] = ["lat", "latitude", "y"];

/// Values this large are the NetCDF default fill, written when a cell was never set.
const DEFAULT_FILL_THRESHOLD: f32 = 9.0e36;

/// Reads one grid from a NetCDF file.
///
/// Uses `variable` when present, otherwise the first variable laid out on the latitude and
/// longitude dimensions. Extra dimensions of length one (usually `time`) are dropped.
pub(crate) fn read(
    path: &Path,
    variable: &str,
    timestamp: DateTime<Utc>,
) -> Result<RasterFrame, RasterError> {
    let file = netcdf::open(path).map_err(|e| RasterError::NetCdf(path.to_path_buf(), e))?;

    let lon_name = find_axis(&file, &LON_NAMES)
        .ok_or_else(|| RasterError::MissingVariable(path.to_path_buf(), "lon".to_string()))?;
    let lat_name = find_axis(&file, &LAT_NAMES)
        .ok_or_else(|| RasterError::MissingVariable(path.to_path_buf(), "lat".to_string()))?;

    let var = match file.variable(variable) {
        Some(var) => var,
        None => file
            .variables()
            .find(|var| is_grid(var, &lon_name, &lat_name))
            .ok_or_else(|| {
                RasterError::MissingVariable(path.to_path_buf(), variable.to_string())
            })?,
    };
    let var_name = var.name();
    debug!("Reading variable '{var_name}' from {}", path.display());

    let dims: Vec<(String, usize)> = var
        .dimensions()
        .iter()
        .map(|dim| (dim.name(), dim.len()))
        .collect();
    let lon_pos = dims.iter().position(|(name, _)| *name == lon_name);
    let lat_pos = dims.iter().position(|(name, _)| *name == lat_name);
    let extra_dims_squeezable = dims
        .iter()
        .filter(|(name, _)| *name != lon_name && *name != lat_name)
        .all(|(_, len)| *len == 1);
    let (Some(lon_pos), Some(lat_pos)) = (lon_pos, lat_pos) else {
        return Err(RasterError::UnexpectedShape(path.to_path_buf(), var_name));
    };
    if !extra_dims_squeezable {
        return Err(RasterError::UnexpectedShape(path.to_path_buf(), var_name));
    }

    let xs = read_axis(&file, path, &lon_name)?;
    let ys = read_axis(&file, path, &lat_name)?;
    let raw: Vec<f32> = var
        .get_values(..)
        .map_err(|e| RasterError::NetCdf(path.to_path_buf(), e))?;

    let fill = get_f32_attr(&var, "_FillValue").or_else(|| get_f32_attr(&var, "missing_value"));
    let scale = get_f32_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = get_f32_attr(&var, "add_offset").unwrap_or(0.0);
    let unpack = |value: f32| {
        if !value.is_finite()
            || fill.is_some_and(|fill| value == fill)
            || value.abs() >= DEFAULT_FILL_THRESHOLD
        {
            f32::NAN
        } else {
            value * scale + offset
        }
    };

    // Stored as [lat][lon] or [lon][lat]; normalise to latitude-major.
    let (nx, ny) = (xs.len(), ys.len());
    let values: Vec<f32> = if lat_pos < lon_pos {
        raw.iter().map(|&v| unpack(v)).collect()
    } else {
        let mut transposed = vec![f32::NAN; raw.len()];
        for (i, &value) in raw.iter().enumerate() {
            let (lon_index, lat_index) = (i / ny, i % ny);
            if let Some(cell) = transposed.get_mut(lat_index * nx + lon_index) {
                *cell = unpack(value);
            }
        }
        transposed
    };

    RasterFrame::from_axes(timestamp, Crs::WGS84, &xs, &ys, &values, None)
        .map_err(|e| RasterError::Grid(path.to_path_buf(), e))
}

fn find_axis(file: &netcdf::File, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|name| file.dimension(name).is_some())
        .map(|name| name.to_string())
}

fn is_grid(var: &netcdf::Variable, lon_name: &str, lat_name: &str) -> bool {
    let names: Vec<String> = var.dimensions().iter().map(|dim| dim.name()).collect();
    let name = var.name();
    name != lon_name
        && name != lat_name
        && (2..=3).contains(&names.len())
        && names.iter().any(|n| n == lon_name)
        && names.iter().any(|n| n == lat_name)
}

fn read_axis(file: &netcdf::File, path: &Path, name: &str) -> Result<Vec<f64>, RasterError> {
    let var = file
        .variable(name)
        .ok_or_else(|| RasterError::MissingVariable(path.to_path_buf(), name.to_string()))?;
    let values: Vec<f64> = var
        .get_values(..)
        .map_err(|e| RasterError::NetCdf(path.to_path_buf(), e))?;
    if name.starts_with("lon") || name == "x" {
        return Ok(values
            .into_iter()
            .map(|lon| if lon > 180.0 { lon - 360.0 } else { lon })
            .collect());
    }
    Ok(values)
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}
