//! Lockless Bridge Binary
//!
//! Menjalankan satu port serial virtual:
//! - Thread bridge (mio) berperan sebagai IRQ handler: TCP -> RX FIFO, TX FIFO -> TCP
//! - Thread utama berperan sebagai aplikasi: echo RX ke TX
//!
//! Usage:
//!   cargo run --release --bin lockless_bridge [OPTIONS]
//!
//! Test dengan:
//!   nc 127.0.0.1 5555

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lockless::serial::{channel, Bridge, BridgeConfig, BridgeStats, DataBits, SerialConfig};

/// Konfigurasi dari command line
struct BridgeCliConfig {
    bridge: BridgeConfig,
    serial: SerialConfig,
    stats_interval: Duration,
}

impl Default for BridgeCliConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            serial: SerialConfig::default(),
            stats_interval: Duration::from_secs(5),
        }
    }
}

fn print_stats(stats: &BridgeStats, echoed: u64, overflows: u64, uptime: Duration) {
    let bytes_in = stats.bytes_received.load(Ordering::Relaxed);
    let bytes_out = stats.bytes_sent.load(Ordering::Relaxed);
    let dropped = stats.bytes_dropped.load(Ordering::Relaxed);
    let conns = stats.connections_total.load(Ordering::Relaxed);
    let rejected = stats.connections_rejected.load(Ordering::Relaxed);
    let closed = stats.connections_closed.load(Ordering::Relaxed);

    let rate_in = bytes_in as f64 / uptime.as_secs_f64();

    println!("\n📊 Bridge Stats (uptime: {:.1}s)", uptime.as_secs_f64());
    println!("   Bytes IN:      {} ({:.1}/sec)", bytes_in, rate_in);
    println!("   Bytes OUT:     {}", bytes_out);
    println!("   Echoed:        {}", echoed);
    println!("   Connections:   {} ({} rejected, {} closed)", conns, rejected, closed);
    if dropped > 0 || overflows > 0 {
        println!("   Dropped:       {} ⚠️ ({} overflow events)", dropped, overflows);
    }
}

/// Main loop: bridge di thread sendiri, aplikasi echo di thread ini
fn run_bridge(config: BridgeCliConfig) -> io::Result<()> {
    println!("🚀 LOCKLESS BRIDGE - Virtual Serial Port");
    println!("========================================\n");

    let (mut port, line) = channel(&config.serial);
    let mut bridge = Bridge::bind(config.bridge.clone(), line)?;
    let stats = bridge.stats();

    println!("🔌 Listening on {}", bridge.local_addr()?);
    println!(
        "📦 FIFO: rx={} tx={} bytes, {:?} data bits",
        config.serial.rx_depth, config.serial.tx_depth, config.serial.data_bits
    );
    println!("\n📡 Waiting for connections...\n");

    let stop = Arc::new(AtomicBool::new(false));
    let bridge_stop = Arc::clone(&stop);
    let bridge_thread = thread::spawn(move || bridge.run(&bridge_stop));

    let start_time = Instant::now();
    let mut last_stats_print = Instant::now();
    let mut echoed = 0u64;
    let mut overflows = 0u64;

    loop {
        if bridge_thread.is_finished() {
            break;
        }

        // Echo: byte hanya dikonsumsi jika TX punya ruang
        let mut moved = false;
        while port.available_for_write() > 0 {
            match port.read() {
                Some(byte) => {
                    port.write(byte);
                    echoed += 1;
                    moved = true;
                }
                None => break,
            }
        }

        if port.overflow() {
            overflows += 1;
            if config.bridge.verbose {
                eprintln!("⚠️ RX overflow, bytes dropped");
            }
        }

        if last_stats_print.elapsed() > config.stats_interval {
            print_stats(&stats, echoed, overflows, start_time.elapsed());
            last_stats_print = Instant::now();
        }

        if !moved {
            thread::sleep(Duration::from_micros(100));
        }
    }

    stop.store(true, Ordering::Relaxed);
    match bridge_thread.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("bridge thread panicked")),
    }
}

fn parse_args() -> BridgeCliConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = BridgeCliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bridge.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--rx-depth" => {
                if i + 1 < args.len() {
                    config.serial.rx_depth = args[i + 1].parse::<usize>().unwrap_or(32).max(1);
                    i += 1;
                }
            }
            "--tx-depth" => {
                if i + 1 < args.len() {
                    config.serial.tx_depth = args[i + 1].parse::<usize>().unwrap_or(32).max(1);
                    config.serial.tx_chunk = config.serial.tx_depth;
                    i += 1;
                }
            }
            "--data-bits" => {
                if i + 1 < args.len() {
                    config.serial.data_bits = args[i + 1]
                        .parse::<u8>()
                        .ok()
                        .and_then(DataBits::from_bits)
                        .unwrap_or(DataBits::Eight);
                    i += 1;
                }
            }
            "--stats" => {
                if i + 1 < args.len() {
                    let secs = args[i + 1].parse::<u64>().unwrap_or(5);
                    config.stats_interval = Duration::from_secs(secs);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.bridge.verbose = true;
            }
            "--help" | "-h" => {
                println!("Lockless Bridge - Virtual Serial Port over TCP\n");
                println!("Usage: lockless_bridge [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>       Bind address (default: 127.0.0.1:5555)");
                println!("      --rx-depth <N>      RX FIFO depth in bytes (default: 32)");
                println!("      --tx-depth <N>      TX FIFO depth in bytes (default: 32)");
                println!("      --data-bits <5-8>   Data bits per frame (default: 8)");
                println!("      --stats <SECS>      Stats interval (default: 5)");
                println!("  -v, --verbose           Verbose output");
                println!("  -h, --help              Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    let config = parse_args();

    if let Err(e) = run_bridge(config) {
        eprintln!("❌ Bridge error: {}", e);
        std::process::exit(1);
    }
}
