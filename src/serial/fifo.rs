//! Software FIFO untuk port serial (UART/PIO/BLE UART)
//!
//! Dua queue SPSC per port:
//! - RX: [`SerialLine`] (interrupt side) menulis, [`SerialPort`] (aplikasi) membaca
//! - TX: [`SerialPort`] menulis, [`SerialLine`] men-drain per chunk
//!
//! Byte yang tidak muat di RX FIFO dibuang dan menyalakan overflow latch
//! yang tetap menyala sampai aplikasi membacanya lewat [`SerialPort::overflow`].

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{LocklessQueue, OwnedReader, OwnedWriter};

/// Jumlah data bit per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    /// Mask untuk membuang bit di atas data bits
    #[inline(always)]
    pub const fn mask(self) -> u8 {
        match self {
            DataBits::Five => 0x1F,
            DataBits::Six => 0x3F,
            DataBits::Seven => 0x7F,
            DataBits::Eight => 0xFF,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(DataBits::Five),
            6 => Some(DataBits::Six),
            7 => Some(DataBits::Seven),
            8 => Some(DataBits::Eight),
            _ => None,
        }
    }
}

/// Konfigurasi FIFO port serial
#[derive(Debug, Clone, Copy)]
pub struct SerialConfig {
    /// Jumlah byte yang bisa ditampung RX FIFO
    pub rx_depth: usize,
    /// Jumlah byte yang bisa ditampung TX FIFO
    pub tx_depth: usize,
    pub data_bits: DataBits,
    /// Maksimal byte per drain TX
    pub tx_chunk: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            rx_depth: 32,
            tx_depth: 32,
            data_bits: DataBits::Eight,
            tx_chunk: 32,
        }
    }
}

/// Membuat pasangan port aplikasi dan line (interrupt side)
///
/// # Panics
/// Panic jika `rx_depth`, `tx_depth`, atau `tx_chunk` bernilai 0
pub fn channel(config: &SerialConfig) -> (SerialPort, SerialLine) {
    assert!(config.tx_chunk > 0, "tx_chunk must be non-zero");

    let (rx_writer, rx_reader) = LocklessQueue::with_depth(config.rx_depth).into_split();
    let (tx_writer, tx_reader) = LocklessQueue::with_depth(config.tx_depth).into_split();
    let overflow = Arc::new(AtomicBool::new(false));

    (
        SerialPort {
            rx: rx_reader,
            tx: tx_writer,
            overflow: Arc::clone(&overflow),
        },
        SerialLine {
            rx: rx_writer,
            tx: tx_reader,
            overflow,
            mask: config.data_bits.mask(),
            tx_chunk: config.tx_chunk,
        },
    )
}

/// Sisi aplikasi: baca RX, tulis TX
pub struct SerialPort {
    rx: OwnedReader<u8>,
    tx: OwnedWriter<u8>,
    overflow: Arc<AtomicBool>,
}

impl SerialPort {
    /// Baca satu byte, `None` jika RX kosong
    #[inline]
    pub fn read(&mut self) -> Option<u8> {
        self.rx.read()
    }

    #[inline]
    pub fn peek(&mut self) -> Option<u8> {
        self.rx.peek()
    }

    /// Byte yang menunggu di RX FIFO
    #[inline]
    pub fn available(&self) -> usize {
        self.rx.available()
    }

    /// Ruang kosong di TX FIFO
    #[inline]
    pub fn available_for_write(&self) -> usize {
        self.tx.free()
    }

    /// Queue satu byte untuk dikirim, `false` jika TX penuh
    #[inline]
    pub fn write(&mut self, byte: u8) -> bool {
        self.tx.write(byte)
    }

    pub fn write_slice(&mut self, data: &[u8]) -> usize {
        self.tx.write_slice(data)
    }

    /// Apakah ada byte RX yang dibuang sejak pemanggilan terakhir (lalu clear)
    pub fn overflow(&self) -> bool {
        self.overflow.swap(false, Ordering::AcqRel)
    }
}

impl io::Read for SerialPort {
    /// Non-blocking: `WouldBlock` jika RX kosong
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.read_into(buf) {
            0 => Err(io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }
}

impl io::Write for SerialPort {
    /// Non-blocking: `WouldBlock` jika TX penuh
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.tx.write_slice(buf) {
            0 => Err(io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Drain TX adalah tugas line side
        Ok(())
    }
}

/// Sisi line/interrupt: isi RX dari hardware, drain TX ke hardware
pub struct SerialLine {
    rx: OwnedWriter<u8>,
    tx: OwnedReader<u8>,
    overflow: Arc<AtomicBool>,
    mask: u8,
    tx_chunk: usize,
}

impl SerialLine {
    /// Terima satu byte dari hardware.
    ///
    /// Returns `false` jika RX penuh; byte dibuang dan overflow latch menyala.
    #[inline]
    pub fn receive(&mut self, byte: u8) -> bool {
        if self.rx.write(byte & self.mask) {
            true
        } else {
            self.overflow.store(true, Ordering::Release);
            false
        }
    }

    /// Terima burst dari hardware, returns jumlah byte yang masuk FIFO.
    ///
    /// Semua byte tetap dicoba satu per satu (seperti drain HW FIFO),
    /// jadi byte setelah yang dibuang masih bisa masuk jika reader sempat membaca.
    pub fn receive_slice(&mut self, data: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in data {
            if self.receive(byte) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Drain TX FIFO ke `dst`, maksimal `tx_chunk` byte
    pub fn transmit_into(&mut self, dst: &mut [u8]) -> usize {
        let len = dst.len().min(self.tx_chunk);
        self.tx.read_into(&mut dst[..len])
    }

    /// Byte yang menunggu di TX FIFO
    pub fn pending_tx(&self) -> usize {
        self.tx.available()
    }

    /// Ruang kosong di RX FIFO
    pub fn rx_free(&self) -> usize {
        self.rx.free()
    }

    pub fn tx_chunk(&self) -> usize {
        self.tx_chunk
    }
}
