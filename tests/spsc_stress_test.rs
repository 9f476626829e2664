//! SPSC Stress Test - Writer dan Reader di thread berbeda
//!
//! Simulasi IRQ handler (writer) vs task (reader) dengan delay acak di
//! kedua sisi. Semua value harus sampai, urutan tidak boleh berubah.
//!
//! Usage:
//!   cargo test --release --test spsc_stress_test -- --nocapture

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use lockless::core::{LocklessQueue, SharedQueue};

/// Record yang lebih lebar dari satu word, untuk mendeteksi torn read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Sample {
    sequence: u64,
    check: u64,
    payload: [u32; 4],
}

impl Sample {
    fn new(sequence: u64) -> Self {
        let check = sequence.wrapping_mul(6364136223846793005).wrapping_add(1);
        Self {
            sequence,
            check,
            payload: [sequence as u32, check as u32, !(sequence as u32), (check >> 32) as u32],
        }
    }
}

/// LCG kecil untuk delay acak yang reproducible
struct Jitter(u64);

impl Jitter {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    /// Spin pendek, kadang yield ke scheduler
    fn pause(&mut self) {
        match self.next() % 16 {
            0 => thread::yield_now(),
            n if n < 4 => {
                for _ in 0..(self.next() % 64) {
                    std::hint::spin_loop();
                }
            }
            _ => {}
        }
    }
}

/// Statistics collector
struct StressStats {
    write_retries: AtomicU64,
    read_misses: AtomicU64,
}

impl StressStats {
    fn new() -> Self {
        Self {
            write_retries: AtomicU64::new(0),
            read_misses: AtomicU64::new(0),
        }
    }
}

fn run_stress(capacity: usize, total: u64, seed: u64) {
    let (mut writer, mut reader) = LocklessQueue::<Sample>::new(capacity).into_split();
    let stats = Arc::new(StressStats::new());

    let writer_stats = Arc::clone(&stats);
    let producer = thread::spawn(move || {
        let mut jitter = Jitter(seed);
        for sequence in 0..total {
            let sample = Sample::new(sequence);
            while !writer.write(sample) {
                writer_stats.write_retries.fetch_add(1, Ordering::Relaxed);
                jitter.pause();
            }
            jitter.pause();
        }
    });

    let mut jitter = Jitter(seed ^ 0xDEADBEEF);
    let mut expected = 0u64;
    while expected < total {
        match reader.read() {
            Some(sample) => {
                assert_eq!(sample, Sample::new(expected), "out of order or torn sample");
                expected += 1;
            }
            None => {
                stats.read_misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        jitter.pause();
    }

    producer.join().unwrap();

    assert!(reader.is_empty());
    assert_eq!(reader.read(), None);
    println!(
        "  capacity={} total={} write_retries={} read_misses={}",
        capacity,
        total,
        stats.write_retries.load(Ordering::Relaxed),
        stats.read_misses.load(Ordering::Relaxed)
    );
}

#[test]
fn test_stress_small_queue() {
    // Banyak kali lipat kapasitas: writer sering kena backpressure
    run_stress(4, 200_000, 1);
}

#[test]
fn test_stress_medium_queue() {
    run_stress(64, 500_000, 7);
}

#[test]
fn test_stress_many_seeds() {
    for seed in 0..8 {
        run_stress(2 + seed as usize, 20_000, seed);
    }
}

#[test]
fn test_stress_scoped_split() {
    let mut queue: LocklessQueue<u32> = LocklessQueue::with_depth(16);
    let total = 100_000u32;

    thread::scope(|s| {
        let (mut writer, mut reader) = queue.split();

        s.spawn(move || {
            for i in 0..total {
                while !writer.write(i) {
                    std::hint::spin_loop();
                }
            }
        });

        s.spawn(move || {
            let mut expected = 0;
            let mut peeked = 0u64;
            while expected < total {
                if let Some(v) = reader.peek() {
                    peeked += 1;
                    assert_eq!(v, expected);
                    assert_eq!(reader.read(), Some(expected));
                    expected += 1;
                }
            }
            assert!(peeked >= total as u64);
        });
    });

    // Handles sudah selesai, reset sekarang aman
    queue.reset();
    assert!(queue.is_empty());
    assert_eq!(queue.available(), 0);
}

#[test]
fn test_stress_shared_mapping() {
    let path = std::env::temp_dir().join(format!("lockless_stress_{}.dat", std::process::id()));
    std::fs::remove_file(&path).ok();

    let mut writer = SharedQueue::<[u64; 2]>::open(&path, 32).unwrap().into_writer();
    let mut reader = SharedQueue::<[u64; 2]>::open(&path, 32).unwrap().into_reader();
    let total = 100_000u64;

    let start = Instant::now();
    let producer = thread::spawn(move || {
        for i in 0..total {
            while !writer.write([i, !i]) {
                thread::yield_now();
            }
        }
    });

    let mut expected = 0u64;
    while expected < total {
        if let Some([value, inverse]) = reader.read() {
            assert_eq!(value, expected);
            assert_eq!(inverse, !expected);
            expected += 1;
        }
    }

    producer.join().unwrap();
    println!(
        "  shared mapping: {} records in {:.2}ms",
        total,
        start.elapsed().as_secs_f64() * 1000.0
    );

    std::fs::remove_file(&path).ok();
}
