//! TCP Bridge: memainkan peran interrupt context untuk satu port serial
//!
//! Menggunakan mio untuk non-blocking I/O. Byte dari client TCP masuk ke
//! RX FIFO lewat [`SerialLine::receive_slice`] (persis seperti IRQ handler
//! yang men-drain HW FIFO), dan isi TX FIFO dikirim balik ke client per chunk.
//!
//! Hanya satu client pada satu waktu: port serial fisik juga cuma punya satu
//! sambungan. Client tambahan langsung ditutup.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use super::fifo::SerialLine;

const LISTENER_TOKEN: Token = Token(0);
const CLIENT_TOKEN: Token = Token(1);
const EVENTS_CAPACITY: usize = 64;
const READ_BUFFER_SIZE: usize = 4 * 1024; // 4KB

/// Konfigurasi bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind_addr: String,
    /// Timeout poll, juga interval maksimum antar drain TX
    pub poll_timeout: Duration,
    /// Ukuran SO_RCVBUF/SO_SNDBUF untuk client (unix saja)
    pub socket_buffer: Option<usize>,
    pub verbose: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5555".to_string(),
            poll_timeout: Duration::from_millis(1),
            socket_buffer: Some(16 * 1024),
            verbose: false,
        }
    }
}

/// Statistik bridge
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub bytes_received: AtomicU64,
    pub bytes_dropped: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub connections_total: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub connections_closed: AtomicU64,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Client yang sedang tersambung
struct Client {
    stream: TcpStream,
    addr: SocketAddr,
}

/// Chunk TX yang sudah keluar dari FIFO tapi belum terkirim penuh.
///
/// Milik bridge, bukan client: sisa chunk tetap ada setelah disconnect dan
/// dikirim duluan ke client berikutnya.
struct PendingTx {
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl PendingTx {
    fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    #[inline]
    fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..self.len]
    }

    #[inline]
    fn is_drained(&self) -> bool {
        self.pos == self.len
    }

    /// Isi ulang dari TX FIFO, return jumlah byte baru
    fn refill(&mut self, line: &mut SerialLine) -> usize {
        self.pos = 0;
        self.len = line.transmit_into(&mut self.buf);
        self.len
    }
}

/// Event loop yang menjembatani satu client TCP dan satu [`SerialLine`]
pub struct Bridge {
    poll: Poll,
    listener: TcpListener,
    client: Option<Client>,
    line: SerialLine,
    pending_tx: PendingTx,
    stats: Arc<BridgeStats>,
    read_buffer: Box<[u8]>,
    config: BridgeConfig,
}

impl Bridge {
    /// Bind listener dan siapkan event loop
    pub fn bind(config: BridgeConfig, line: SerialLine) -> io::Result<Self> {
        let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid bind address {}: {}", config.bind_addr, e),
            )
        })?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;

        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        let pending_tx = PendingTx::new(line.tx_chunk());

        Ok(Self {
            poll,
            listener,
            client: None,
            line,
            pending_tx,
            stats: Arc::new(BridgeStats::new()),
            read_buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle ke statistik, bisa dibaca dari thread lain
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Jalankan event loop sampai `stop` bernilai true
    pub fn run(&mut self, stop: &AtomicBool) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        if self.config.verbose {
            println!("🔌 Bridge listening on {}", self.local_addr()?);
        }

        while !stop.load(Ordering::Relaxed) {
            self.poll_once(&mut events)?;
        }

        Ok(())
    }

    /// Satu iterasi: poll, accept, baca RX, drain TX
    pub fn poll_once(&mut self, events: &mut Events) -> io::Result<()> {
        match self.poll.poll(events, Some(self.config.poll_timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        let mut readable = false;
        for event in events.iter() {
            match event.token() {
                LISTENER_TOKEN => self.accept_connections()?,
                CLIENT_TOKEN => readable |= event.is_readable() || event.is_read_closed(),
                _ => {}
            }
        }

        if readable {
            self.handle_read();
        }

        // TX di-drain setiap iterasi, tidak menunggu event writable
        self.pump_tx();

        Ok(())
    }

    /// Accept new connections
    fn accept_connections(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    self.stats.connections_total.fetch_add(1, Ordering::Relaxed);

                    if self.client.is_some() {
                        self.stats
                            .connections_rejected
                            .fetch_add(1, Ordering::Relaxed);
                        if self.config.verbose {
                            eprintln!("⚠️ Port busy, rejecting {}", addr);
                        }
                        continue;
                    }

                    stream.set_nodelay(true)?;
                    if let Some(size) = self.config.socket_buffer {
                        tune_socket_buffers(&stream, size);
                    }

                    self.poll
                        .registry()
                        .register(&mut stream, CLIENT_TOKEN, Interest::READABLE)?;

                    if self.config.verbose {
                        println!("✅ Connected: {}", addr);
                    }

                    self.client = Some(Client { stream, addr });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Handle readable event: baca sampai WouldBlock (mio edge-triggered)
    fn handle_read(&mut self) {
        let client = match self.client.as_mut() {
            Some(c) => c,
            None => return,
        };

        loop {
            match client.stream.read(&mut self.read_buffer) {
                Ok(0) => {
                    self.disconnect("closed by peer");
                    return;
                }
                Ok(n) => {
                    let accepted = self.line.receive_slice(&self.read_buffer[..n]);
                    if accepted < n {
                        self.stats
                            .bytes_dropped
                            .fetch_add((n - accepted) as u64, Ordering::Relaxed);
                    }
                    // Counter IN di-update terakhir: dropped sudah final saat IN terlihat
                    self.stats
                        .bytes_received
                        .fetch_add(n as u64, Ordering::Release);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.disconnect(&format!("read error: {}", e));
                    return;
                }
            }
        }
    }

    /// Kirim isi TX FIFO ke client
    fn pump_tx(&mut self) {
        let client = match self.client.as_mut() {
            Some(c) => c,
            None => return, // TX tetap di FIFO (dan pending) sampai ada client
        };

        loop {
            if self.pending_tx.is_drained() && self.pending_tx.refill(&mut self.line) == 0 {
                return;
            }

            match client.stream.write(self.pending_tx.remaining()) {
                Ok(0) => {
                    self.disconnect("write returned zero");
                    return;
                }
                Ok(n) => {
                    self.pending_tx.pos += n;
                    self.stats.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.disconnect(&format!("write error: {}", e));
                    return;
                }
            }
        }
    }

    /// Byte TX yang belum terkirim: isi FIFO ditambah sisa chunk
    pub fn unsent_tx(&self) -> usize {
        self.line.pending_tx() + self.pending_tx.remaining().len()
    }

    fn disconnect(&mut self, reason: &str) {
        if let Some(mut client) = self.client.take() {
            let _ = self.poll.registry().deregister(&mut client.stream);
            let _ = client.stream.flush();
            self.stats.connections_closed.fetch_add(1, Ordering::Release);
            if self.config.verbose {
                println!("❌ Disconnected: {} ({})", client.addr, reason);
            }
        }
    }
}

/// Set socket buffer sizes. Error diabaikan - tidak semua platform support.
#[cfg(unix)]
fn tune_socket_buffers(stream: &TcpStream, size: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval = size.min(libc::c_int::MAX as usize) as libc::c_int;
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(not(unix))]
fn tune_socket_buffers(_stream: &TcpStream, _size: usize) {}
