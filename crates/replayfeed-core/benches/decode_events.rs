// Snapshot decode benchmark - measure line parsing and gzip payload overhead
//
// Compares plain JSON payloads against gzip byte-string payloads so a
// regression in either path shows up on its own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::GzEncoder;
use flate2::Compression;
use replayfeed_core::{decode_batch_body, merge_batches};
use serde_json::json;
use std::io::Write;

fn batch_body(lines: usize, compressed: bool) -> String {
    (0..lines)
        .map(|i| {
            let payload = json!({"source": 1, "positions": [{"x": i, "y": i * 2, "id": 7}]});
            let data = if compressed {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(payload.to_string().as_bytes()).unwrap();
                let bytes = encoder.finish().unwrap();
                json!(bytes.into_iter().map(char::from).collect::<String>())
            } else {
                payload
            };
            // Reverse timestamps so the merge has real work to do
            json!(["window", {"type": 3, "data": data, "timestamp": 1_000_000 - i as i64}])
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_batch");

    for (name, compressed) in [("plain", false), ("gzip", true)] {
        let body = batch_body(1_000, compressed);
        group.throughput(Throughput::Elements(1_000));

        group.bench_with_input(BenchmarkId::from_parameter(name), &body, |b, body| {
            b.iter(|| {
                let decoded = decode_batch_body(body);
                black_box(decoded);
            });
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_batches");
    let batches: Vec<_> = (0..20)
        .map(|_| decode_batch_body(&batch_body(500, false)).events)
        .collect();
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("20x500", |b| {
        b.iter(|| {
            let stream = merge_batches(batches.clone());
            black_box(stream);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_merge);
criterion_main!(benches);
