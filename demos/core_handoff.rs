//! Core Handoff - Simulasi dua core berbagi satu LocklessQueue
//!
//! Skenario:
//! 1. "Core 0" berperan sebagai sampler (seperti IRQ ADC) yang menulis sample
//!    dengan timestamp nanodetik
//! 2. "Core 1" berperan sebagai task yang mengonsumsi sample dan menghitung
//!    latency handoff
//! 3. Jika queue penuh, sampler membuang sample dan menghitung overflow
//!    (sampler tidak boleh blocking)
//!
//! Usage:
//!   cargo run --release --example core_handoff -- [options]
//!
//! Options:
//!   --samples <N>    Jumlah sample (default: 1000000)
//!   --depth <N>      Kedalaman queue (default: 256)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use lockless::core::LocklessQueue;

/// Sample yang dipindah antar core
#[derive(Clone, Copy)]
struct Sample {
    sequence: u64,
    /// Waktu sample ditulis (ns sejak start)
    written_ns: u64,
    channel: u8,
    value: u16,
}

struct DemoConfig {
    samples: u64,
    depth: usize,
}

fn parse_args() -> DemoConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DemoConfig {
        samples: 1_000_000,
        depth: 256,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--samples" => {
                if i + 1 < args.len() {
                    config.samples = args[i + 1].parse().unwrap_or(config.samples);
                    i += 1;
                }
            }
            "--depth" => {
                if i + 1 < args.len() {
                    config.depth = args[i + 1].parse::<usize>().unwrap_or(config.depth).max(1);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    let config = parse_args();

    println!("🔀 Core Handoff Demo (Lock-Free SPSC)");
    println!("-------------------------------------");
    println!("  Samples: {}", config.samples);
    println!("  Depth:   {}\n", config.depth);

    let (mut writer, mut reader) = LocklessQueue::<Sample>::with_depth(config.depth).into_split();
    let done = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    // Core 0: sampler, tidak pernah menunggu reader
    let sampler_done = Arc::clone(&done);
    let total = config.samples;
    let sampler = thread::spawn(move || {
        let mut overflows = 0u64;
        let mut hash = 1u64;
        for sequence in 0..total {
            hash = hash.wrapping_mul(6364136223846793005).wrapping_add(1);
            let sample = Sample {
                sequence,
                written_ns: start.elapsed().as_nanos() as u64,
                channel: (hash % 4) as u8,
                value: ((hash >> 20) & 0x0FFF) as u16, // 12-bit ADC
            };
            if !writer.write(sample) {
                overflows += 1;
            }
        }
        sampler_done.store(true, Ordering::Release);
        overflows
    });

    // Core 1: consumer
    let mut received = 0u64;
    let mut last_sequence = None;
    let mut latency_sum_ns = 0u64;
    let mut latency_max_ns = 0u64;
    let mut channel_totals = [0u64; 4];

    loop {
        match reader.read() {
            Some(sample) => {
                if let Some(last) = last_sequence {
                    assert!(sample.sequence > last, "samples must arrive in order");
                }
                last_sequence = Some(sample.sequence);

                let latency = (start.elapsed().as_nanos() as u64).saturating_sub(sample.written_ns);
                latency_sum_ns += latency;
                latency_max_ns = latency_max_ns.max(latency);
                channel_totals[sample.channel as usize] += sample.value as u64;
                received += 1;
            }
            None => {
                // Cek done setelah queue kosong: sample terakhir sudah terbaca
                if done.load(Ordering::Acquire) && reader.is_empty() {
                    break;
                }
                std::hint::spin_loop();
            }
        }
    }

    let overflows = sampler.join().unwrap_or(0);
    let duration = start.elapsed();

    println!("📊 RESULTS");
    println!("==========");
    println!("  Duration:    {:.2}ms", duration.as_secs_f64() * 1000.0);
    println!("  Received:    {}", received);
    println!("  Overflows:   {}", overflows);
    println!(
        "  Throughput:  {:.2} M samples/sec",
        received as f64 / duration.as_secs_f64() / 1_000_000.0
    );
    if received > 0 {
        println!(
            "  Latency:     avg {:.2} μs, max {:.2} μs",
            latency_sum_ns as f64 / received as f64 / 1000.0,
            latency_max_ns as f64 / 1000.0
        );
    }
    println!("  Channel sums: {:?}", channel_totals);

    assert_eq!(received + overflows, config.samples);
    println!("\n✅ Every sample was either delivered in order or counted as overflow");
}
