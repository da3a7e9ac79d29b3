use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nc_raster_tools::raster::{Affine, Band, CellType, Crs, Profile, Raster};
use nc_raster_tools::transform::warp::{self, Grid, Resampling};
use nc_raster_tools::transform::{classify_raster, difference};
use std::collections::HashMap;

fn generate_rgba_raster(width: usize, height: usize) -> Raster {
    let mut bands = vec![Band::filled(width, height, 0.0); 4];
    for row in 0..height {
        for col in 0..width {
            let value = ((row + col) % 4) as f64 * 64.0;
            bands[0].set(row, col, value);
            bands[1].set(row, col, 255.0 - value);
            bands[2].set(row, col, value / 2.0);
            bands[3].set(row, col, if col % 17 == 0 { 0.0 } else { 255.0 });
        }
    }
    let profile = Profile::new(width, height, CellType::UInt8);
    Raster::new(profile, bands).expect("valid raster")
}

fn generate_elevation_raster(width: usize, height: usize, offset: f64) -> Raster {
    let data = (0..width * height)
        .map(|i| (i % width) as f64 * 0.5 + (i / width) as f64 + offset)
        .collect();
    let band = Band::new(width, height, data).expect("valid band");
    let profile = Profile::new(width, height, CellType::Float32)
        .with_crs(Crs::WGS84)
        .with_transform(Affine::from_origin(4.0, 53.0, 0.001, 0.001))
        .with_nodata(Some(-9999.0));
    Raster::new(profile, vec![band]).expect("valid raster")
}

fn benchmark_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_by_size");
    let lut: HashMap<[u8; 3], i32> = (0..4u8)
        .map(|i| ([i * 64, 255 - i * 64, i * 32], i as i32 + 1))
        .collect();

    for size in [100, 500, 1000] {
        let raster = generate_rgba_raster(size, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &raster, |b, raster| {
            b.iter(|| classify_raster(black_box(raster), &lut))
        });
    }

    group.finish();
}

fn benchmark_subtraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtract_by_size");

    for size in [100, 500, 1000] {
        let lhs = generate_elevation_raster(size, size, 10.0);
        let rhs = generate_elevation_raster(size, size, 0.0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &(lhs, rhs), |b, (lhs, rhs)| {
            b.iter(|| difference(black_box(lhs), black_box(rhs)))
        });
    }

    group.finish();
}

fn benchmark_reprojection(c: &mut Criterion) {
    let mut group = c.benchmark_group("warp_to_mercator");
    group.sample_size(10);
    let raster = generate_elevation_raster(256, 256, 0.0);
    let grid = Grid::covering(
        Crs::WGS84,
        &raster.transform(),
        raster.width(),
        raster.height(),
        Crs::WEB_MERCATOR,
    )
    .expect("grid");

    for (resampling, label) in [(Resampling::Nearest, "nearest"), (Resampling::Average, "average")] {
        group.bench_function(label, |b| {
            b.iter(|| {
                warp::warp(
                    black_box(&raster),
                    Crs::WGS84,
                    &raster.transform(),
                    &grid,
                    resampling,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_classification,
    benchmark_subtraction,
    benchmark_reprojection
);
criterion_main!(benches);
