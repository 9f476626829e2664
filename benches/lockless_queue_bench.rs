//! Criterion benchmark untuk LocklessQueue
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lockless::core::LocklessQueue;
use std::thread;

fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("lockless_queue");
    group.throughput(Throughput::Elements(1));

    // Benchmark write
    group.bench_function("write", |b| {
        let mut queue: LocklessQueue<u64> = LocklessQueue::new(65536);
        let (mut writer, mut reader) = queue.split();
        let mut i = 0u64;
        b.iter(|| {
            if !writer.write(black_box(i)) {
                reader.read();
                writer.write(black_box(i));
            }
            i = i.wrapping_add(1);
        });
    });

    // Benchmark read
    group.bench_function("read", |b| {
        let mut queue: LocklessQueue<u64> = LocklessQueue::new(65536);
        let (mut writer, mut reader) = queue.split();
        // Pre-fill
        for i in 0..32768 {
            writer.write(i);
        }
        b.iter(|| {
            if let Some(v) = reader.read() {
                writer.write(black_box(v));
            }
        });
    });

    // Benchmark peek (tidak mengubah state)
    group.bench_function("peek", |b| {
        let mut queue: LocklessQueue<u64> = LocklessQueue::new(1024);
        let (mut writer, mut reader) = queue.split();
        writer.write(42);
        b.iter(|| black_box(reader.peek()));
    });

    // Benchmark write+read cycle
    group.bench_function("write_read_cycle", |b| {
        let mut queue: LocklessQueue<u64> = LocklessQueue::new(65536);
        let (mut writer, mut reader) = queue.split();
        let mut i = 0u64;
        b.iter(|| {
            writer.write(black_box(i));
            let _ = reader.read();
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    // Batch operations
    for batch_size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_function(format!("batch_{}", batch_size), |b| {
            let mut queue: LocklessQueue<u64> = LocklessQueue::new(65536);
            let (mut writer, mut reader) = queue.split();
            b.iter(|| {
                for i in 0..*batch_size {
                    writer.write(black_box(i as u64));
                }
                for _ in 0..*batch_size {
                    black_box(reader.read());
                }
            });
        });
    }

    group.finish();
}

fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_thread");
    const BATCH: u64 = 10_000;
    group.throughput(Throughput::Elements(BATCH));

    // Writer dan reader di thread berbeda, queue kecil seperti FIFO serial
    for capacity in [33usize, 1024].iter() {
        group.bench_function(format!("spsc_capacity_{}", capacity), |b| {
            b.iter(|| {
                let mut queue: LocklessQueue<u64> = LocklessQueue::new(*capacity);
                thread::scope(|s| {
                    let (mut writer, mut reader) = queue.split();
                    s.spawn(move || {
                        for i in 0..BATCH {
                            while !writer.write(i) {
                                std::hint::spin_loop();
                            }
                        }
                    });
                    let mut received = 0;
                    while received < BATCH {
                        if let Some(v) = reader.read() {
                            black_box(v);
                            received += 1;
                        }
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_read, bench_throughput, bench_cross_thread);
criterion_main!(benches);
