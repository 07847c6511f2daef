//! Ring and audio window write/read performance benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use sphero_common::config::FleetConfig;
use sphero_shared_memory::SharedState;
use std::hint::black_box;

/// Benchmark camera and microphone writes at the default geometry
fn bench_producer_writes(c: &mut Criterion) {
    let config = FleetConfig::default();
    let state = SharedState::new(&config).unwrap();

    let rgb = vec![0xAAu8; config.camera.rgb_frame_len()];
    let depth = vec![0x0FFFu16; config.camera.depth_frame_len()];
    let chunk = vec![0.25f32; config.audio_samples_per_chunk()];

    c.bench_function("write_rgb_frame", |b| {
        b.iter(|| state.write_video_frame(black_box(&rgb), 1).unwrap());
    });

    c.bench_function("write_depth_frame", |b| {
        b.iter(|| state.write_depth_frame(black_box(&depth), 1).unwrap());
    });

    c.bench_function("push_audio_chunk", |b| {
        b.iter(|| state.push_audio_chunk(black_box(&chunk), 1).unwrap());
    });
}

/// Benchmark the facade's snapshot copy
fn bench_snapshot(c: &mut Criterion) {
    let state = SharedState::new(&FleetConfig::default()).unwrap();

    c.bench_function("rgbd_snapshot", |b| {
        b.iter(|| black_box(state.rgbd_snapshot()));
    });

    c.bench_function("audio_snapshot", |b| {
        b.iter(|| black_box(state.audio_snapshot()));
    });
}

criterion_group!(benches, bench_producer_writes, bench_snapshot);
criterion_main!(benches);
