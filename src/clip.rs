use crate::geometry::{Geometry, GeometryError};
use crate::raster::frame::RasterFrame;
use log::debug;

/// Masks every cell of `frame` whose centre lies outside `geometry`.
///
/// The geometry is reprojected into the frame's CRS when the two differ; the raster itself is
/// never resampled. With `crop` the result is also cut down to the rows and columns touching
/// the geometry's bounding box, which leaves the surviving values unchanged. A geometry that
/// misses the frame entirely yields a frame without valid cells (and, when cropping, without
/// any cells).
///
/// # Errors
///
/// Returns [`GeometryError::MissingCrs`] if the geometry carries no CRS and
/// [`GeometryError::Projection`] if it cannot be transformed into the frame's CRS.
pub fn clip(
    frame: &RasterFrame,
    geometry: &Geometry,
    crop: bool,
) -> Result<RasterFrame, GeometryError> {
    geometry.require_crs()?;
    let geometry = geometry.reproject(&frame.crs())?;

    let masked = frame.masked(|row, col| {
        let (x, y) = frame.cell_center(row, col);
        geometry.contains(x, y)
    });
    if !crop {
        return Ok(masked);
    }

    let Some(bbox) = geometry.bounding_box() else {
        return Ok(masked.window(0..0, 0..0));
    };
    let transform = frame.transform();
    let (col_a, col_b) = (
        transform.column_at(bbox.min().x),
        transform.column_at(bbox.max().x),
    );
    let (row_a, row_b) = (transform.row_at(bbox.min().y), transform.row_at(bbox.max().y));
    let cols = cell_span(col_a.min(col_b), col_a.max(col_b), frame.width());
    let rows = cell_span(row_a.min(row_b), row_a.max(row_b), frame.height());
    debug!("Cropping frame to rows {rows:?} and columns {cols:?}");

    match (rows, cols) {
        (Some(rows), Some(cols)) => Ok(masked.window(rows, cols)),
        _ => Ok(masked.window(0..0, 0..0)),
    }
}

/// Cell indices covered by the fractional interval `[low, high]`, clamped to `0..len`.
fn cell_span(low: f64, high: f64, len: usize) -> Option<std::ops::Range<usize>> {
    let start = low.floor().max(0.0) as usize;
    let end = (high.ceil().max(0.0) as usize).min(len);
    (start < end).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use chrono::{TimeZone, Utc};
    use geo_types::{Coord, LineString, Polygon};

    /// 4x4 one-degree grid over 50W..46W, 10S..14S holding 1..=16 row by row.
    fn frame() -> RasterFrame {
        let values: Vec<f32> = (1..=16).map(|v| v as f32).collect();
        RasterFrame::from_axes(
            Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap(),
            Crs::WGS84,
            &[-49.5, -48.5, -47.5, -46.5],
            &[-10.5, -11.5, -12.5, -13.5],
            &values,
            None,
        )
        .unwrap()
    }

    fn inner_square(crs: Option<Crs>) -> Geometry {
        Geometry::rectangle((-48.9, -12.9), (-47.1, -11.1), crs)
    }

    #[test]
    fn test_mask_keeps_shape() -> Result<(), GeometryError> {
        let clipped = clip(&frame(), &inner_square(Some(Crs::WGS84)), false)?;
        assert_eq!((clipped.width(), clipped.height()), (4, 4));
        let valid: Vec<f32> = clipped.values().iter().copied().filter(|v| !v.is_nan()).collect();
        assert_eq!(valid, vec![6.0, 7.0, 10.0, 11.0]);
        Ok(())
    }

    #[test]
    fn test_crop_keeps_values() -> Result<(), GeometryError> {
        let source = frame();
        let cropped = clip(&source, &inner_square(Some(Crs::WGS84)), true)?;
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.values(), &[6.0, 7.0, 10.0, 11.0]);
        assert_eq!(cropped.cell_center(0, 0), source.cell_center(1, 1));
        Ok(())
    }

    #[test]
    fn test_missing_crs() {
        assert!(matches!(
            clip(&frame(), &inner_square(None), false),
            Err(GeometryError::MissingCrs)
        ));
    }

    #[test]
    fn test_projected_geometry_is_reprojected() -> Result<(), GeometryError> {
        let utm = Crs::from_epsg(31983)?;
        let to_utm = Crs::WGS84.transformer_to(&utm)?;
        let ring = [
            (-48.9, -12.9),
            (-47.1, -12.9),
            (-47.1, -11.1),
            (-48.9, -11.1),
            (-48.9, -12.9),
        ]
        .iter()
        .map(|&(lon, lat)| to_utm.apply(lon, lat).map(|(x, y)| Coord { x, y }))
        .collect::<Result<LineString<f64>, _>>()?;
        let geometry = Geometry::new(Polygon::new(ring, vec![]), Some(utm));

        let clipped = clip(&frame(), &geometry, true)?;
        assert_eq!(clipped.crs(), Crs::WGS84);
        assert_eq!(clipped.values(), &[6.0, 7.0, 10.0, 11.0]);
        Ok(())
    }

    #[test]
    fn test_disjoint_geometry() -> Result<(), GeometryError> {
        let far_away = Geometry::rectangle((10.0, 10.0), (11.0, 11.0), Some(Crs::WGS84));
        let masked = clip(&frame(), &far_away, false)?;
        assert_eq!(masked.valid_count(), 0);
        let cropped = clip(&frame(), &far_away, true)?;
        assert_eq!((cropped.width(), cropped.height()), (0, 0));
        Ok(())
    }
}
