//! Bridge Test - Loopback lewat TCP
//!
//! Client TCP -> Bridge (IRQ side) -> RX FIFO -> aplikasi
//! aplikasi -> TX FIFO -> Bridge -> Client TCP

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lockless::serial::{channel, Bridge, BridgeConfig, SerialConfig, SerialPort};

type BridgeHandle = (
    SerialPort,
    std::net::SocketAddr,
    Arc<lockless::serial::BridgeStats>,
    Arc<AtomicBool>,
    thread::JoinHandle<std::io::Result<()>>,
);

fn start_bridge(serial: SerialConfig) -> BridgeHandle {
    start_bridge_with(serial, BridgeConfig::default())
}

fn start_bridge_with(serial: SerialConfig, config: BridgeConfig) -> BridgeHandle {
    let (port, line) = channel(&serial);
    let config = BridgeConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..config
    };
    let mut bridge = Bridge::bind(config, line).unwrap();
    let addr = bridge.local_addr().unwrap();
    let stats = bridge.stats();

    let stop = Arc::new(AtomicBool::new(false));
    let bridge_stop = Arc::clone(&stop);
    let handle = thread::spawn(move || bridge.run(&bridge_stop));

    (port, addr, stats, stop, handle)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_bridge_loopback() {
    let (mut port, addr, stats, stop, handle) = start_bridge(SerialConfig::default());

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    client.write_all(b"hello").unwrap();

    // RX: client -> aplikasi
    let mut received = Vec::new();
    assert!(wait_until(|| {
        while let Some(byte) = port.read() {
            received.push(byte);
        }
        received.len() >= 5
    }));
    assert_eq!(received, b"hello");
    assert!(!port.overflow());

    // TX: aplikasi -> client
    assert_eq!(port.write_slice(b"world"), 5);
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"world");

    assert_eq!(stats.bytes_received.load(Ordering::Relaxed), 5);
    assert!(wait_until(|| stats.bytes_sent.load(Ordering::Relaxed) == 5));

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}

#[test]
fn test_bridge_overflow_drops_and_latches() {
    let serial = SerialConfig {
        rx_depth: 8,
        ..SerialConfig::default()
    };
    let (port, addr, stats, stop, handle) = start_bridge(serial);

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(&[0x55u8; 64]).unwrap();

    // Aplikasi tidak membaca: FIFO penuh di 8, sisanya dibuang
    assert!(wait_until(|| stats.bytes_received.load(Ordering::Acquire) == 64));
    assert_eq!(stats.bytes_dropped.load(Ordering::Relaxed), 56);
    assert_eq!(port.available(), 8);
    assert!(port.overflow());
    assert!(!port.overflow());

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}

#[test]
fn test_bridge_rejects_second_client() {
    let (_port, addr, stats, stop, handle) = start_bridge(SerialConfig::default());

    let _first = TcpStream::connect(addr).unwrap();
    assert!(wait_until(|| stats.connections_total.load(Ordering::Relaxed) == 1));

    let _second = TcpStream::connect(addr).unwrap();
    assert!(wait_until(|| stats.connections_rejected.load(Ordering::Relaxed) == 1));
    assert_eq!(stats.connections_total.load(Ordering::Relaxed), 2);

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}

#[test]
fn test_tx_chunk_survives_client_disconnect() {
    const TOTAL: usize = 2 * 1024 * 1024;
    let serial = SerialConfig {
        tx_depth: TOTAL,
        tx_chunk: 512 * 1024,
        ..SerialConfig::default()
    };
    let config = BridgeConfig {
        socket_buffer: Some(4096),
        ..BridgeConfig::default()
    };
    let (mut port, addr, stats, stop, handle) = start_bridge_with(serial, config);

    let data: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
    assert_eq!(port.write_slice(&data), TOTAL);

    // Client pertama tidak pernah membaca: kirim macet di tengah chunk
    let first = TcpStream::connect(addr).unwrap();
    assert!(wait_until(|| stats.bytes_sent.load(Ordering::Relaxed) > 0));
    let mut last = 0;
    assert!(wait_until(|| {
        thread::sleep(Duration::from_millis(20));
        let sent = stats.bytes_sent.load(Ordering::Relaxed);
        let stalled = sent == last;
        last = sent;
        stalled
    }));
    drop(first);

    assert!(wait_until(|| stats.connections_closed.load(Ordering::Acquire) == 1));
    let sent_before = stats.bytes_sent.load(Ordering::Relaxed) as usize;
    assert!(sent_before < TOTAL);

    // Client kedua menerima sisa stream tanpa celah
    let mut second = TcpStream::connect(addr).unwrap();
    second
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut rest = vec![0u8; TOTAL - sent_before];
    second.read_exact(&mut rest).unwrap();
    assert!(rest == data[sent_before..], "stream must resume where the first client stopped");

    assert!(wait_until(|| stats.bytes_sent.load(Ordering::Relaxed) == TOTAL as u64));
    assert_eq!(port.available_for_write(), TOTAL);

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap().unwrap();
}
