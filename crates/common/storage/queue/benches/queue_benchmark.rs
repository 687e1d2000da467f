// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Benchmarks for the work queues.
//!
//! Measures:
//! - Raw store push latency per medium and flush mode
//! - Push-then-drain throughput for FIFO and LIFO disk stores
//! - Codec cost on a request-shaped record

use std::hint::black_box;

use bytes::Bytes;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use frontq_queue::{
    BackingStore, Codec, FlatRecord, FlushMode, ObjectCodec, PrimitiveCodec, QueueBuilder,
    QueueOrder, Store, Value,
};
use tempfile::TempDir;

/// Record sizes to benchmark (bytes)
const RECORD_SIZES: &[usize] = &[64, 256, 1024, 4096];

/// Number of records for throughput tests
const BATCH_SIZE: usize = 10_000;

fn open_disk(temp_dir: &TempDir, order: QueueOrder, flush_mode: FlushMode) -> Store {
    QueueBuilder::disk(temp_dir.path().join("bench"), order)
        .chunk_size(4096)
        .flush_mode(flush_mode)
        .open_store()
        .expect("Failed to open store")
}

fn generate_record(size: usize) -> Bytes { Bytes::from(vec![0xABu8; size]) }

fn request_record() -> FlatRecord {
    let mut record = FlatRecord::new();
    record.insert(
        "url".into(),
        "https://example.com/catalog/page/17?sort=price".into(),
    );
    record.insert("method".into(), "GET".into());
    record.insert("body".into(), Value::Bytes(Vec::new()));
    record.insert("priority".into(), Value::Int(0));
    record.insert(
        "headers".into(),
        Value::List(vec![Value::List(vec![
            "Accept".into(),
            "text/html".into(),
        ])]),
    );
    record.insert("meta".into(), Value::Map(FlatRecord::from([(
        "depth".to_string(),
        Value::Int(3),
    )])));
    record
}

fn bench_push_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_latency");

    for &size in RECORD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, &size| {
            let mut store = QueueBuilder::memory(QueueOrder::Fifo).open_store().unwrap();
            let record = generate_record(size);
            b.iter(|| store.push(black_box(record.clone())).unwrap());
        });

        for order in [QueueOrder::Fifo, QueueOrder::Lifo] {
            group.bench_with_input(
                BenchmarkId::new(format!("disk_{order}_async"), size),
                &size,
                |b, &size| {
                    let temp_dir = TempDir::new().unwrap();
                    let mut store = open_disk(&temp_dir, order, FlushMode::Async);
                    let record = generate_record(size);
                    b.iter(|| store.push(black_box(record.clone())).unwrap());
                    store.close().unwrap();
                },
            );
        }
    }

    group.finish();
}

/// fsync per push is slow; only small records, fewer samples.
fn bench_push_latency_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_latency_sync");
    group.sample_size(20);

    for &size in &[64, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut store = open_disk(&temp_dir, QueueOrder::Fifo, FlushMode::Sync);
            let record = generate_record(size);
            b.iter(|| store.push(black_box(record.clone())).unwrap());
            store.close().unwrap();
        });
    }

    group.finish();
}

fn bench_push_drain_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_drain_throughput");
    group.sample_size(10);

    for order in [QueueOrder::Fifo, QueueOrder::Lifo] {
        let size = 256;
        group.throughput(Throughput::Elements(BATCH_SIZE as u64));
        group.bench_with_input(BenchmarkId::new(order.to_string(), size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let temp_dir = TempDir::new().unwrap();
                    let store = open_disk(
                        &temp_dir,
                        order,
                        FlushMode::Batch {
                            bytes:       64 * 1024,
                            interval_ms: 10,
                        },
                    );
                    (temp_dir, store, generate_record(size))
                },
                |(temp_dir, mut store, record)| {
                    for _ in 0..BATCH_SIZE {
                        store.push(record.clone()).unwrap();
                    }
                    while let Some(popped) = store.pop().unwrap() {
                        black_box(popped);
                    }
                    store.close().unwrap();
                    drop(temp_dir);
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_request_record");
    let record = request_record();

    group.bench_function("object_roundtrip", |b| {
        b.iter(|| {
            let bytes = ObjectCodec.encode(black_box(&record)).unwrap();
            let decoded: FlatRecord = ObjectCodec.decode(&bytes).unwrap();
            black_box(decoded);
        });
    });

    group.bench_function("primitive_roundtrip", |b| {
        b.iter(|| {
            let bytes = PrimitiveCodec.encode(black_box(&record)).unwrap();
            let decoded: FlatRecord = PrimitiveCodec.decode(&bytes).unwrap();
            black_box(decoded);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_push_latency,
    bench_push_latency_sync,
    bench_push_drain_throughput,
    bench_codecs,
);
criterion_main!(benches);
