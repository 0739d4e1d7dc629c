use crate::crs::Crs;
use crate::raster::error::RasterError;
use crate::raster::frame::RasterFrame;
use chrono::{DateTime, Utc};
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads the first field of a GRIB2 file.
///
/// Grid point longitudes in the 0..360 convention are shifted to -180..180.
pub(crate) fn read(path: &Path, timestamp: DateTime<Utc>) -> Result<RasterFrame, RasterError> {
    let file = File::open(path).map_err(|e| RasterError::Open(path.to_path_buf(), e))?;
    let grib = grib::from_reader(BufReader::new(file))
        .map_err(|e| RasterError::Grib(path.to_path_buf(), e.to_string()))?;

    let ((section, submessage), field) = grib
        .iter()
        .next()
        .ok_or_else(|| RasterError::NoMessages(path.to_path_buf()))?;
    debug!("Decoding GRIB2 field {section}.{submessage} of {}", path.display());

    let points: Vec<(f64, f64)> = field
        .latlons()
        .map_err(|e| RasterError::Grib(path.to_path_buf(), e.to_string()))?
        .map(|(lat, lon)| (normalize_longitude(lon as f64), lat as f64))
        .collect();
    let values: Vec<f32> = grib::Grib2SubmessageDecoder::from(field)
        .and_then(|decoder| decoder.dispatch().map(|values| values.collect()))
        .map_err(|e| RasterError::Grib(path.to_path_buf(), e.to_string()))?;

    RasterFrame::from_points(timestamp, Crs::WGS84, &points, &values, None)
        .map_err(|e| RasterError::Grid(path.to_path_buf(), e))
}

fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(300.0), -60.0);
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(-45.5), -45.5);
    }

    #[test]
    fn test_corrupt_file() -> Result<(), std::io::Error> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"<html>Not Found</html>")?;
        let timestamp = Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap();

        let result = read(file.path(), timestamp);
        assert!(
            matches!(result, Err(RasterError::Grib(..)) | Err(RasterError::NoMessages(_))),
            "unexpected result: {result:?}"
        );
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let timestamp = Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap();
        let result = read(Path::new("/nonexistent/MERGE_CPTEC_20230415.grib2"), timestamp);
        assert!(matches!(result, Err(RasterError::Open(..))));
    }
}
