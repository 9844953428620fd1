//! Benchmark for field evaluation
//!
//! Measures canopy-plane field computation, volumetric voxel classification
//! and IDW reconstruction for a typical two-board tent and a larger room.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use flux::{
    classify_voxels, compute_field, compute_field_from_sensors, CategoryFilter, LightSource,
    Resolution, SensorGrid, Volume, DEFAULT_VOXEL_RESOLUTION,
};

fn tent() -> (Volume, Vec<LightSource>) {
    let lights = vec![LightSource::new("board", 1100.0)
        .with_reference_height(1.5)
        .at(0.3, 0.5)
        .at(0.7, 0.5)];
    (Volume::feet(4.0, 4.0, 6.5), lights)
}

fn room() -> (Volume, Vec<LightSource>) {
    // 4 x 3 grid of bars
    let mut bar = LightSource::new("bar", 650.0)
        .with_beam_angle(140.0)
        .with_reference_height(1.5);
    for i in 0..4 {
        for j in 0..3 {
            bar = bar.at((i as f32 + 0.5) / 4.0, (j as f32 + 0.5) / 3.0);
        }
    }
    (Volume::feet(10.0, 8.0, 8.0), vec![bar])
}

fn bench_compute_field(c: &mut Criterion) {
    let (volume, lights) = tent();
    c.bench_function("field_tent_32x32", |b| {
        b.iter(|| {
            compute_field(
                black_box(&volume),
                black_box(&lights),
                Resolution::grid(32, 32),
                Some(2.0),
            )
        })
    });

    let (volume, lights) = room();
    c.bench_function("field_room_64x64", |b| {
        b.iter(|| {
            compute_field(
                black_box(&volume),
                black_box(&lights),
                Resolution::grid(64, 64),
                Some(2.5),
            )
        })
    });
}

fn bench_classify_voxels(c: &mut Criterion) {
    let (volume, lights) = tent();
    let filter = CategoryFilter::all();
    c.bench_function("voxels_tent_default", |b| {
        b.iter(|| {
            classify_voxels(
                black_box(&volume),
                black_box(&lights),
                DEFAULT_VOXEL_RESOLUTION,
                &filter,
            )
        })
    });

    let (volume, lights) = room();
    c.bench_function("voxels_room_24x24x16", |b| {
        b.iter(|| {
            classify_voxels(
                black_box(&volume),
                black_box(&lights),
                Resolution::volume(24, 24, 16),
                &filter,
            )
        })
    });
}

fn bench_idw(c: &mut Criterion) {
    let volume = Volume::feet(4.0, 4.0, 6.0);
    let values = (0..25).map(|i| 150.0 + (i * 37 % 400) as f32).collect();
    let Ok(grid) = SensorGrid::new(5, 5, values) else {
        return;
    };
    c.bench_function("idw_5x5_to_64x64", |b| {
        b.iter(|| compute_field_from_sensors(black_box(&volume), &grid, Resolution::grid(64, 64)))
    });
}

criterion_group!(benches, bench_compute_field, bench_classify_voxels, bench_idw);
criterion_main!(benches);
