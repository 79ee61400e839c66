//! Throughput benchmark for the transcription pipeline (C4) against the
//! mock capabilities, covering both the VAD short-circuit path and the
//! full recognize path across representative buffer sizes.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use wernicke_stream::capabilities::Capabilities;
use wernicke_stream::session::buffer::testing::buffer_id_for_test;
use wernicke_stream::{ResourceSupervisor, TranscriptionPipeline};

fn voiced_samples(seconds: f64) -> Vec<f32> {
    let count = (seconds * 16_000.0) as usize;
    (0..count).map(|i| (i as f32 * 0.01).sin()).collect()
}

fn silent_samples(seconds: f64) -> Vec<f32> {
    vec![0.0f32; (seconds * 16_000.0) as usize]
}

fn bench_partial(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pipeline = Arc::new(TranscriptionPipeline::new(
        Capabilities::mock(),
        Arc::new(ResourceSupervisor::new(4096)),
        "ja",
    ));

    let mut group = c.benchmark_group("process_partial");
    for seconds in [1.0, 5.0, 30.0] {
        group.bench_with_input(
            BenchmarkId::new("voiced", seconds),
            &seconds,
            |b, &seconds| {
                let samples = voiced_samples(seconds);
                b.to_async(&rt).iter(|| {
                    let pipeline = pipeline.clone();
                    let samples = samples.clone();
                    async move {
                        pipeline
                            .process_partial(&samples, buffer_id_for_test(1), None)
                            .await
                            .unwrap()
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("silent", seconds),
            &seconds,
            |b, &seconds| {
                let samples = silent_samples(seconds);
                b.to_async(&rt).iter(|| {
                    let pipeline = pipeline.clone();
                    let samples = samples.clone();
                    async move {
                        pipeline
                            .process_partial(&samples, buffer_id_for_test(1), None)
                            .await
                            .unwrap()
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_partial);
criterion_main!(benches);
