use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use versioned_kv::{MemoryBackingKv, SimpleContext, StoreConfig};

fn bench_put_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_sequential");

    for key_count in [100, 1_000, 10_000] {
        group.bench_function(format!("{key_count} keys"), |b| {
            b.iter(|| {
                let store = StoreConfig::new(
                    "bench",
                    Arc::new(MemoryBackingKv::new()),
                    Arc::new(SimpleContext::new("/tmp/versioned-kv-bench")),
                )
                .segment_interval(1_000)
                .history_retention(1_000_000)
                .open()
                .expect("open should succeed");

                for i in 0..key_count {
                    let key = format!("key-{i}");
                    store.put(key.as_bytes(), b"value", i64::from(i)).unwrap();
                }
            });
        });
    }
}

fn bench_put_out_of_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_out_of_order");

    group.bench_function("1000 keys, reversed timestamps", |b| {
        b.iter(|| {
            let store = StoreConfig::new(
                "bench",
                Arc::new(MemoryBackingKv::new()),
                Arc::new(SimpleContext::new("/tmp/versioned-kv-bench")),
            )
            .segment_interval(100)
            .history_retention(1_000_000)
            .open()
            .expect("open should succeed");

            for i in (0..1_000).rev() {
                store.put(b"hot-key", b"value", i64::from(i)).unwrap();
            }
        });
    });
}

fn bench_get_as_of(c: &mut Criterion) {
    let store = StoreConfig::new(
        "bench",
        Arc::new(MemoryBackingKv::new()),
        Arc::new(SimpleContext::new("/tmp/versioned-kv-bench")),
    )
    .segment_interval(100)
    .history_retention(1_000_000)
    .open()
    .expect("open should succeed");

    for i in 0..10_000_i64 {
        store.put(b"hot-key", format!("v{i}").as_bytes(), i).unwrap();
    }

    c.bench_function("get_as_of mid-history", |b| {
        b.iter(|| store.get_as_of(b"hot-key", 5_000).unwrap());
    });

    c.bench_function("get current", |b| {
        b.iter(|| store.get(b"hot-key").unwrap());
    });
}

criterion_group!(benches, bench_put_sequential, bench_put_out_of_order, bench_get_as_of);
criterion_main!(benches);
