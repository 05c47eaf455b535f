use cairn::StorageEngine;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const KEYS: usize = 2000;

fn setup_engine() -> (TempDir, StorageEngine) {
    let dir = TempDir::new().unwrap();
    let mut db = StorageEngine::open(dir.path()).unwrap();
    for i in 0..KEYS {
        db.insert(&format!("bench:{i}"), &format!("Data_{}", i * 1000))
            .unwrap();
    }
    db.flush_all().unwrap();
    (dir, db)
}

fn benchmark_indexed_get(c: &mut Criterion) {
    let (_dir, mut db) = setup_engine();
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("indexed_get", |b| {
        b.iter(|| {
            let key = format!("bench:{}", rng.gen_range(0..KEYS));
            db.get(black_box(&key)).unwrap()
        })
    });
}

fn benchmark_linear_scan(c: &mut Criterion) {
    let (_dir, mut db) = setup_engine();
    let mut rng = StdRng::seed_from_u64(42);

    c.bench_function("linear_scan", |b| {
        b.iter(|| {
            let key = format!("bench:{}", rng.gen_range(0..KEYS));
            db.linear_scan(black_box(&key)).unwrap()
        })
    });
}

fn benchmark_insert(c: &mut Criterion) {
    let (_dir, mut db) = setup_engine();
    let mut next = KEYS;

    c.bench_function("insert", |b| {
        b.iter(|| {
            let key = format!("bench:{next}");
            next += 1;
            db.insert(black_box(&key), "Data_fresh").unwrap()
        })
    });
}

criterion_group!(
    benches,
    benchmark_indexed_get,
    benchmark_linear_scan,
    benchmark_insert
);
criterion_main!(benches);
