//! Lockless - Lock-Free SPSC Queue untuk Interrupt dan Cross-Core Handoff
//!
//! Arsitektur:
//! - Lock-Free: Atomic-only ring queue, satu writer dan satu reader
//! - No-Allocation: Slot pre-allocated saat konstruksi
//! - Shared Memory: Protokol yang sama di atas file mmap untuk lintas proses
//! - Serial FIFO: RX/TX buffer port serial dengan overflow latch

pub mod core;
pub mod serial;
