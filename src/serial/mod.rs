//! Serial Layer: Software FIFO di atas LocklessQueue
//!
//! Fitur:
//! - RX/TX FIFO per port dengan overflow latch
//! - Masking data bits (5-8 bit per frame)
//! - Bridge TCP berbasis mio sebagai pengganti IRQ handler di host

mod bridge;
mod fifo;

pub use bridge::{Bridge, BridgeConfig, BridgeStats};
pub use fifo::{channel, DataBits, SerialConfig, SerialLine, SerialPort};
