//! Benchmarks for hash slot calculation.
//!
//! Run benchmarks:
//! ```bash
//! cargo bench --bench slot_benchmark
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use submux::{key_slot, same_slot};

/// Benchmark: untagged keys of increasing length.
fn bench_key_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_slot");

    for size in [8, 64, 512, 4096].iter() {
        let key = vec![b'k'; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &key, |b, key| {
            b.iter(|| key_slot(black_box(key)));
        });
    }

    group.finish();
}

/// Benchmark: hash tag extraction on long keys with a short tag.
fn bench_hash_tag(c: &mut Criterion) {
    let key = format!("{{user:1000}}:{}", "x".repeat(1024));
    c.bench_function("key_slot_tagged", |b| {
        b.iter(|| key_slot(black_box(key.as_bytes())));
    });
}

/// Benchmark: co-location check across a batch of tagged keys.
fn bench_same_slot(c: &mut Criterion) {
    let keys: Vec<String> = (0..100).map(|i| format!("{{cart:7}}:item:{i}")).collect();
    c.bench_function("same_slot_100", |b| {
        b.iter(|| same_slot(black_box(&keys)));
    });
}

criterion_group!(benches, bench_key_slot, bench_hash_tag, bench_same_slot);
criterion_main!(benches);
