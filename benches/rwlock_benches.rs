use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use rand::prelude::*;
use rand_distr::Pareto;
use std::collections::HashMap;
use std::sync::Arc;

type Table = HashMap<String, u64>;

fn table() -> Table {
    let mut table: Table = HashMap::new();
    table.insert("data".into(), 1_u64);
    table
}

/// Probability of a read, drawn heavy-tailed so most batches are read dominated.
fn read_ratio() -> f64 {
    1. / thread_rng().sample(Pareto::new(1., 5.0_f64.log(4.0_f64)).unwrap())
}

fn rw_pareto_tether(
    lock: Arc<tether::sync::rwlock::RwLock<Table>>,
    key: String,
    dist: f64,
    thread_count: u64,
) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let lock = lock.clone();
        let key = key.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                if thread_rng().gen_bool(dist) {
                    let guard = lock.read().unwrap();
                    guard.get(&key);
                } else {
                    let mut guard = lock.write().unwrap();
                    *guard.entry(key).or_insert(0) += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn rw_pareto_std(lock: Arc<std::sync::RwLock<Table>>, key: String, dist: f64, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let lock = lock.clone();
        let key = key.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                if thread_rng().gen_bool(dist) {
                    let guard = lock.read().unwrap();
                    guard.get(&key);
                } else {
                    let mut guard = lock.write().unwrap();
                    *guard.entry(key).or_insert(0) += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn rw_pareto_parking_lot(
    lock: Arc<parking_lot::RwLock<Table>>,
    key: String,
    dist: f64,
    thread_count: u64,
) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let lock = lock.clone();
        let key = key.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                if thread_rng().gen_bool(dist) {
                    let guard = lock.read();
                    guard.get(&key);
                } else {
                    let mut guard = lock.write();
                    *guard.entry(key).or_insert(0) += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn bench_rwlock_rw_pareto(c: &mut Criterion) {
    let key: String = "data".into();
    let threads = 8;

    let mut group = c.benchmark_group("rwlock_rw_pareto_throughput");
    group.throughput(Throughput::Elements(threads));

    let lock = Arc::new(tether::sync::rwlock::RwLock::new(table()));
    let k = key.clone();
    group.bench_function("tether", move |b| {
        b.iter_batched(
            || (lock.clone(), k.clone(), read_ratio()),
            |vars| rw_pareto_tether(vars.0, vars.1, vars.2, threads),
            BatchSize::SmallInput,
        )
    });

    let lock = Arc::new(std::sync::RwLock::new(table()));
    let k = key.clone();
    group.bench_function("std", move |b| {
        b.iter_batched(
            || (lock.clone(), k.clone(), read_ratio()),
            |vars| rw_pareto_std(vars.0, vars.1, vars.2, threads),
            BatchSize::SmallInput,
        )
    });

    let lock = Arc::new(parking_lot::RwLock::new(table()));
    group.bench_function("parking_lot", move |b| {
        b.iter_batched(
            || (lock.clone(), key.clone(), read_ratio()),
            |vars| rw_pareto_parking_lot(vars.0, vars.1, vars.2, threads),
            BatchSize::SmallInput,
        )
    });
}

////////////////////////////////

fn bench_rwlock_uncontended_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("rwlock_uncontended_reads");
    group.throughput(Throughput::Elements(1));

    let key: String = "data".into();

    let tether_lock = tether::sync::rwlock::RwLock::new(table());
    group.bench_function("tether", |b| {
        b.iter(|| tether_lock.read().unwrap().get(&key).copied())
    });

    let std_lock = std::sync::RwLock::new(table());
    group.bench_function("std", |b| {
        b.iter(|| std_lock.read().unwrap().get(&key).copied())
    });

    let pl_lock = parking_lot::RwLock::new(table());
    group.bench_function("parking_lot", |b| b.iter(|| pl_lock.read().get(&key).copied()));
}

criterion_group! {
    name = rwlock_benches;
    config = Criterion::default();
    targets = bench_rwlock_rw_pareto, bench_rwlock_uncontended_reads
}
criterion_main!(rwlock_benches);
