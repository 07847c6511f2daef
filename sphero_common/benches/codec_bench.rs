//! Frame codec benchmarks.
//!
//! Measures encoding of outbound requests and streaming decode of telemetry
//! frames, the hot path of every robot link at ~9 Hz per robot.

use criterion::{Criterion, criterion_group, criterion_main};
use sphero_common::protocol::consts::ROBOT_TARGET_ID;
use sphero_common::protocol::{CommandMessage, FrameDecoder, Request, Telemetry};
use std::hint::black_box;

fn telemetry_frame() -> Vec<u8> {
    let sample = Telemetry {
        pitch: 1.0,
        roll: -2.0,
        yaw: 45.0,
        position_x: 12.5,
        velocity_y: -3.0,
        ..Telemetry::default()
    };
    CommandMessage::request(0x18, 2, Some(ROBOT_TARGET_ID), 7, &sample.to_payload())
        .expect("payload fits")
        .encode()
}

fn bench_encode_roll(c: &mut Criterion) {
    let request = Request::Roll {
        speed: 128,
        heading: 90,
    };
    c.bench_function("encode_roll", |b| {
        b.iter(|| black_box(black_box(request).into_message(1).encode()));
    });
}

fn bench_decode_telemetry(c: &mut Criterion) {
    let frame = telemetry_frame();
    let mut decoder = FrameDecoder::new();
    c.bench_function("decode_telemetry_frame", |b| {
        b.iter(|| {
            for msg in decoder.feed(black_box(&frame)).into_iter().flatten() {
                black_box(Telemetry::decode(&msg.payload).ok());
            }
        });
    });
}

criterion_group!(benches, bench_encode_roll, bench_decode_telemetry);
criterion_main!(benches);
