use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use merge_downloader::{clip, reduce, Crs, Geometry, RasterFrame};

/// A 0.1 degree grid over Brazil, about the size of one daily MERGE field.
fn brazil_frame() -> RasterFrame {
    let xs: Vec<f64> = (0..500).map(|i| -75.0 + 0.1 * i as f64).collect();
    let ys: Vec<f64> = (0..450).map(|j| 6.0 - 0.1 * j as f64).collect();
    let values: Vec<f32> = (0..xs.len() * ys.len())
        .map(|i| if i % 7 == 0 { f32::NAN } else { (i % 50) as f32 })
        .collect();
    let timestamp = Utc.with_ymd_and_hms(2023, 4, 15, 12, 0, 0).unwrap();
    RasterFrame::from_axes(timestamp, Crs::WGS84, &xs, &ys, &values, None).unwrap()
}

fn bench_series(c: &mut Criterion) {
    let frame = brazil_frame();
    let area = Geometry::rectangle((-48.0, -24.0), (-44.0, -20.0), Some(Crs::WGS84));
    let utm_area = area.reproject(&Crs::from_epsg(31983).unwrap()).unwrap();

    c.bench_function("reduce", |b| b.iter(|| reduce(black_box(&frame))));
    c.bench_function("clip_crop", |b| {
        b.iter(|| clip(black_box(&frame), black_box(&area), true))
    });
    c.bench_function("clip_utm_geometry", |b| {
        b.iter(|| clip(black_box(&frame), black_box(&utm_area), false))
    });
}

criterion_group!(benches, bench_series);
criterion_main!(benches);
