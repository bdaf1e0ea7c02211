use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};

use kevadb::{flush, MemNameStore, NameCache, NameKey, NameRead, NameRecord, OutPoint, WriteOptions};

fn name(i: u32) -> NameKey {
    // Fixed-width keys keep every name in one length class.
    NameKey::new(Bytes::from_static(b"bench"), Bytes::from(format!("k{:08}", i)))
}

fn record(i: u32) -> NameRecord {
    NameRecord::new(format!("v{:08}", i), i, OutPoint::new([0; 32], i), "owner")
}

fn preload(n: u32) -> MemNameStore {
    let store = MemNameStore::in_memory();
    let mut cache = NameCache::new();
    for i in (0..n).step_by(2) {
        cache.set(name(i), record(i));
    }
    flush(&mut cache, &store, WriteOptions::default()).expect("flush");
    store
}

fn pending(n: u32) -> NameCache {
    let mut cache = NameCache::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for i in 0..n {
        match rng.gen_range(0..4) {
            0 => cache.remove(name(i)),
            1 | 2 => cache.set(name(i), record(i + 1)),
            _ => {}
        }
    }
    cache
}

fn bench_set(c: &mut Criterion) {
    c.bench_function("cache-set/100k", |b| {
        b.iter_batched(
            || {
                let mut ids: Vec<u32> = (0..100_000).collect();
                ids.shuffle(&mut StdRng::seed_from_u64(0x5eed));
                ids
            },
            |ids| {
                let mut cache = NameCache::new();
                for i in ids {
                    cache.set(name(i), record(i));
                }
                cache
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_merged_scan(c: &mut Criterion) {
    let store = preload(100_000);
    let cache = pending(100_000);
    c.bench_function("merged-scan/100k", |b| {
        b.iter(|| {
            let iter = cache.iterate_names(store.iter_names().expect("iter"));
            let mut n = 0usize;
            for next in iter {
                let _ = next.expect("next");
                n += 1;
            }
            n
        });
    });
}

fn bench_apply(c: &mut Criterion) {
    let child = pending(50_000);
    c.bench_function("apply/50k", |b| {
        b.iter_batched(
            || pending(100_000),
            |mut parent| {
                parent.apply(&child);
                parent
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_flush(c: &mut Criterion) {
    c.bench_function("flush/100k", |b| {
        b.iter_batched(
            || (preload(100_000), pending(100_000)),
            |(store, mut cache)| {
                flush(&mut cache, &store, WriteOptions::default()).expect("flush");
                store
            },
            BatchSize::LargeInput,
        );
    });
}

fn benches(c: &mut Criterion) {
    bench_set(c);
    bench_merged_scan(c);
    bench_apply(c);
    bench_flush(c);
}

criterion_group!(name_cache_benches, benches);
criterion_main!(name_cache_benches);
