use crate::error::MergeError;
use crate::raster::frame::RasterFrame;
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::{Column, CsvWriter, DataFrame, ParquetCompression, ParquetWriter, SerWriter};
use serde::Serialize;
use std::path::Path;
use tokio::task;

/// Spatial mean of the valid cells of `frame`.
///
/// Returns `None` when every cell is `NaN`, so an empty window never shows up as zero rain.
pub fn reduce(frame: &RasterFrame) -> Option<f64> {
    let (sum, count) = frame
        .values()
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(sum, count), &v| (sum + v as f64, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Ordered `(timestamp, value)` pairs for one product variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    variable: String,
    entries: Vec<(DateTime<Utc>, f64)>,
}

impl TimeSeries {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        self.entries.push((timestamp, value));
    }

    /// Name of the value column, e.g. `prec`.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, f64)> {
        self.entries.iter()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.entries.iter().map(|(t, _)| *t).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    /// Value recorded for `timestamp`, if that period produced one.
    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.entries
            .iter()
            .find(|(t, _)| *t == timestamp)
            .map(|(_, v)| *v)
    }

    /// Two-column table: `time` (UTC, milliseconds) and the variable.
    pub fn to_dataframe(&self) -> Result<DataFrame, MergeError> {
        let times: Vec<NaiveDateTime> = self.entries.iter().map(|(t, _)| t.naive_utc()).collect();
        let values = self.values();
        let df = DataFrame::new(vec![
            Column::new("time".into(), times),
            Column::new(self.variable.as_str().into(), values),
        ])?;
        Ok(df)
    }

    pub async fn write_csv(&self, path: &Path) -> Result<(), MergeError> {
        let mut df = self.to_dataframe()?;
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut file = std::fs::File::create(&path_buf)
                .map_err(|e| MergeError::ExportIo(path_buf.clone(), e))?;
            CsvWriter::new(&mut file)
                .finish(&mut df)
                .map_err(|e| MergeError::ExportPolars(path_buf, e))?;
            Ok::<(), MergeError>(())
        })
        .await??;
        Ok(())
    }

    pub async fn write_parquet(&self, path: &Path) -> Result<(), MergeError> {
        let mut df = self.to_dataframe()?;
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| MergeError::ExportIo(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| MergeError::ExportPolars(path_buf, e))?;
            Ok::<(), MergeError>(())
        })
        .await??;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a (DateTime<Utc>, f64);
    type IntoIter = std::slice::Iter<'a, (DateTime<Utc>, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use chrono::TimeZone;
    use polars::prelude::{DataType, ParquetReader, SerReader, TimeUnit};

    fn frame(values: &[f32]) -> RasterFrame {
        RasterFrame::from_axes(
            Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap(),
            Crs::WGS84,
            &[0.0, 1.0],
            &[1.0, 0.0],
            values,
            None,
        )
        .unwrap()
    }

    fn series() -> TimeSeries {
        let mut series = TimeSeries::new("prec");
        series.push(Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap(), 2.5);
        series.push(Utc.with_ymd_and_hms(2023, 4, 16, 12, 0, 0).unwrap(), 0.0);
        series
    }

    #[test]
    fn test_reduce_ignores_nodata() {
        assert_eq!(reduce(&frame(&[1.0, 2.0, 3.0, 6.0])), Some(3.0));
        assert_eq!(reduce(&frame(&[1.0, f32::NAN, f32::NAN, 2.0])), Some(1.5));
        assert_eq!(reduce(&frame(&[f32::NAN; 4])), None);
    }

    #[test]
    fn test_series_accessors() {
        let series = series();
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), vec![2.5, 0.0]);
        assert_eq!(
            series.get(Utc.with_ymd_and_hms(2023, 4, 16, 12, 0, 0).unwrap()),
            Some(0.0)
        );
        assert_eq!(
            series.get(Utc.with_ymd_and_hms(2023, 4, 17, 12, 0, 0).unwrap()),
            None
        );
        assert_eq!((&series).into_iter().count(), 2);
    }

    #[test]
    fn test_to_dataframe() -> Result<(), MergeError> {
        let df = series().to_dataframe()?;
        assert_eq!(df.shape(), (2, 2));
        assert!(matches!(
            df.column("time")?.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));
        let prec = df.column("prec")?.f64()?;
        assert_eq!(prec.get(0), Some(2.5));
        Ok(())
    }

    #[tokio::test]
    async fn test_exports() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("series.csv");
        let parquet_path = dir.path().join("series.parquet");
        let series = series();

        series.write_csv(&csv_path).await?;
        let csv = std::fs::read_to_string(&csv_path)?;
        assert!(csv.starts_with("time,prec"));
        assert_eq!(csv.lines().count(), 3);

        series.write_parquet(&parquet_path).await?;
        let df = ParquetReader::new(std::fs::File::open(&parquet_path)?).finish()?;
        assert_eq!(df.height(), 2);
        Ok(())
    }
}
