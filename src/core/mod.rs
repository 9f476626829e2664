//! Core module: Lock-Free SPSC Queue
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic load/store, tidak ada Mutex/CAS
//! - No-Allocation: Semua slot pre-allocated saat init
//! - Dua role: tepat satu Writer dan satu Reader per queue

mod indices;
mod lockless_queue;
mod shared_queue;

pub use lockless_queue::{
    CapacityError, LocklessQueue, OwnedReader, OwnedWriter, Reader, Writer, MIN_CAPACITY,
};
pub use shared_queue::{Plain, SharedQueue, SharedReader, SharedWriter};
