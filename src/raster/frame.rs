use crate::crs::Crs;
use crate::raster::error::GridError;
use chrono::{DateTime, Utc};
use std::ops::Range;

/// Relative tolerance when checking that axis coordinates are evenly spaced.
const SPACING_TOLERANCE: f64 = 1e-3;

/// Affine mapping from grid cells to map coordinates.
///
/// `(origin_x, origin_y)` is the outer corner of cell `(0, 0)`; with north-up grids
/// `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional column of map coordinate `x`.
    pub fn column_at(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.pixel_width
    }

    /// Fractional row of map coordinate `y`.
    pub fn row_at(&self, y: f64) -> f64 {
        (y - self.origin_y) / self.pixel_height
    }

    fn shifted(&self, rows: usize, cols: usize) -> Self {
        Self {
            origin_x: self.origin_x + cols as f64 * self.pixel_width,
            origin_y: self.origin_y + rows as f64 * self.pixel_height,
            ..*self
        }
    }
}

/// One period of a product as a north-up grid.
///
/// Values are row-major, row 0 is the northernmost row and `NaN` marks cells without data.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    timestamp: DateTime<Utc>,
    crs: Crs,
    transform: GeoTransform,
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl RasterFrame {
    pub fn new(
        timestamp: DateTime<Utc>,
        crs: Crs,
        transform: GeoTransform,
        width: usize,
        height: usize,
        values: Vec<f32>,
    ) -> Result<Self, GridError> {
        if width * height != values.len() {
            return Err(GridError::ShapeMismatch {
                expected: width * height,
                found: values.len(),
            });
        }
        Ok(Self {
            timestamp,
            crs,
            transform,
            width,
            height,
            values,
        })
    }

    /// Builds a frame from coordinate axes and a `ys.len() x xs.len()` grid stored row by row
    /// in axis order.
    ///
    /// Columns are reordered west to east and rows north to south, whatever the storage order.
    /// Non-finite values and values equal to `nodata` become `NaN`.
    pub fn from_axes(
        timestamp: DateTime<Utc>,
        crs: Crs,
        xs: &[f64],
        ys: &[f64],
        values: &[f32],
        nodata: Option<f32>,
    ) -> Result<Self, GridError> {
        let (nx, ny) = (xs.len(), ys.len());
        if nx * ny != values.len() {
            return Err(GridError::ShapeMismatch {
                expected: nx * ny,
                found: values.len(),
            });
        }

        let mut x_order: Vec<usize> = (0..nx).collect();
        x_order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
        let mut y_order: Vec<usize> = (0..ny).collect();
        y_order.sort_by(|&a, &b| ys[b].total_cmp(&ys[a]));

        let sorted_xs: Vec<f64> = x_order.iter().map(|&i| xs[i]).collect();
        let ascending_ys: Vec<f64> = y_order.iter().rev().map(|&j| ys[j]).collect();
        let dx = regular_step(&sorted_xs, "x")?;
        let dy = regular_step(&ascending_ys, "y")?;

        let mut grid = Vec::with_capacity(values.len());
        for &j in &y_order {
            for &i in &x_order {
                grid.push(clean(values[j * nx + i], nodata));
            }
        }

        let transform = GeoTransform {
            origin_x: sorted_xs[0] - dx / 2.0,
            origin_y: ascending_ys[ny - 1] + dy / 2.0,
            pixel_width: dx,
            pixel_height: -dy,
        };
        Self::new(timestamp, crs, transform, nx, ny, grid)
    }

    /// Builds a frame from scattered cell centres `(x, y)` that together form a regular
    /// lattice, in any order.
    pub fn from_points(
        timestamp: DateTime<Utc>,
        crs: Crs,
        points: &[(f64, f64)],
        values: &[f32],
        nodata: Option<f32>,
    ) -> Result<Self, GridError> {
        if points.len() != values.len() {
            return Err(GridError::ShapeMismatch {
                expected: points.len(),
                found: values.len(),
            });
        }
        let xs = distinct(points.iter().map(|p| p.0));
        let ys = distinct(points.iter().map(|p| p.1));
        let (width, height) = (xs.len(), ys.len());
        if width * height != points.len() {
            return Err(GridError::IncompleteLattice { width, height });
        }
        let dx = regular_step(&xs, "x")?;
        let dy = regular_step(&ys, "y")?;
        let (west, north) = (xs[0], ys[height - 1]);

        let mut grid = vec![f32::NAN; width * height];
        let mut filled = vec![false; width * height];
        for (&(x, y), &value) in points.iter().zip(values) {
            let col = ((x - west) / dx).round() as usize;
            let row = ((north - y) / dy).round() as usize;
            let index = row * width + col;
            if filled[index] {
                return Err(GridError::IncompleteLattice { width, height });
            }
            filled[index] = true;
            grid[index] = clean(value, nodata);
        }

        let transform = GeoTransform {
            origin_x: west - dx / 2.0,
            origin_y: north + dy / 2.0,
            pixel_width: dx,
            pixel_height: -dy,
        };
        Self::new(timestamp, crs, transform, width, height, grid)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.cell_center(row, col)
    }

    /// Number of cells holding data.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Copy of the frame with every cell for which `keep(row, col)` is false set to `NaN`.
    pub fn masked(&self, mut keep: impl FnMut(usize, usize) -> bool) -> Self {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                if keep(index / self.width, index % self.width) {
                    value
                } else {
                    f32::NAN
                }
            })
            .collect();
        Self {
            values,
            ..self.clone_metadata()
        }
    }

    /// The sub-grid covering `rows` x `cols`, clamped to the frame.
    pub fn window(&self, rows: Range<usize>, cols: Range<usize>) -> Self {
        let rows = rows.start.min(self.height)..rows.end.min(self.height);
        let cols = cols.start.min(self.width)..cols.end.min(self.width);
        let width = cols.len();
        let height = rows.len();
        let mut values = Vec::with_capacity(width * height);
        for row in rows.clone() {
            let start = row * self.width;
            values.extend_from_slice(&self.values[start + cols.start..start + cols.end]);
        }
        Self {
            transform: self.transform.shifted(rows.start, cols.start),
            width,
            height,
            values,
            ..self.clone_metadata()
        }
    }

    fn clone_metadata(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            crs: self.crs,
            transform: self.transform,
            width: self.width,
            height: self.height,
            values: Vec::new(),
        }
    }
}

fn clean(value: f32, nodata: Option<f32>) -> f32 {
    if !value.is_finite() || nodata.is_some_and(|nodata| value == nodata) {
        f32::NAN
    } else {
        value
    }
}

/// Sorted coordinates with near-duplicates merged.
fn distinct(coords: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut sorted: Vec<f64> = coords.collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| (*a - *b).abs() <= 1e-6 * b.abs().max(1.0));
    sorted
}

/// Spacing of an ascending axis, checked to be constant.
fn regular_step(ascending: &[f64], axis: &'static str) -> Result<f64, GridError> {
    let n = ascending.len();
    if n < 2 {
        return Err(GridError::DegenerateAxis(axis));
    }
    let step = (ascending[n - 1] - ascending[0]) / (n - 1) as f64;
    if !step.is_finite() || step <= 0.0 {
        return Err(GridError::DegenerateAxis(axis));
    }
    let irregular = ascending
        .windows(2)
        .any(|w| ((w[1] - w[0]) - step).abs() > step * SPACING_TOLERANCE);
    if irregular {
        return Err(GridError::IrregularAxis(axis));
    }
    Ok(step)
}
