use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use std::sync::Arc;

const ROUNDS: u64 = 1_000;

fn contended_tether(counter: Arc<tether::sync::mutex::Mutex<u64>>, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let counter = counter.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                for _ in 0..ROUNDS {
                    *counter.lock().unwrap() += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn contended_std(counter: Arc<std::sync::Mutex<u64>>, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let counter = counter.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                for _ in 0..ROUNDS {
                    *counter.lock().unwrap() += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn contended_parking_lot(counter: Arc<parking_lot::Mutex<u64>>, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let counter = counter.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                for _ in 0..ROUNDS {
                    *counter.lock() += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn contended_spin(counter: Arc<tether::sync::ttas::SpinLock<u64>>, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let counter = counter.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                for _ in 0..ROUNDS {
                    *counter.lock() += 1;
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn bench_contended_counter(c: &mut Criterion) {
    let threads = 8;

    let mut group = c.benchmark_group("mutex_contended_counter");
    group.throughput(Throughput::Elements(threads * ROUNDS));

    let counter = Arc::new(tether::sync::mutex::Mutex::new(0_u64));
    group.bench_function("tether", move |b| {
        b.iter_batched(
            || counter.clone(),
            |counter| contended_tether(counter, threads),
            BatchSize::SmallInput,
        )
    });

    let counter = Arc::new(std::sync::Mutex::new(0_u64));
    group.bench_function("std", move |b| {
        b.iter_batched(
            || counter.clone(),
            |counter| contended_std(counter, threads),
            BatchSize::SmallInput,
        )
    });

    let counter = Arc::new(parking_lot::Mutex::new(0_u64));
    group.bench_function("parking_lot", move |b| {
        b.iter_batched(
            || counter.clone(),
            |counter| contended_parking_lot(counter, threads),
            BatchSize::SmallInput,
        )
    });

    let counter = Arc::new(tether::sync::ttas::SpinLock::new(0_u64));
    group.bench_function("tether_spin", move |b| {
        b.iter_batched(
            || counter.clone(),
            |counter| contended_spin(counter, threads),
            BatchSize::SmallInput,
        )
    });
}

////////////////////////////////

fn bench_uncontended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutex_uncontended");
    group.throughput(Throughput::Elements(1));

    let tether_lock = tether::sync::mutex::Mutex::new(0_u64);
    group.bench_function("tether", |b| b.iter(|| *tether_lock.lock().unwrap() += 1));

    let std_lock = std::sync::Mutex::new(0_u64);
    group.bench_function("std", |b| b.iter(|| *std_lock.lock().unwrap() += 1));

    let pl_lock = parking_lot::Mutex::new(0_u64);
    group.bench_function("parking_lot", |b| b.iter(|| *pl_lock.lock() += 1));
}

criterion_group! {
    name = mutex_benches;
    config = Criterion::default();
    targets = bench_contended_counter, bench_uncontended_lock
}
criterion_main!(mutex_benches);
