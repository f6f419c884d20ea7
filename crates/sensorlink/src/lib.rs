//! Resynchronising binary frame link between a sensor producer and its
//! consumer.
//!
//! A producer emits one fixed 28-byte frame per sampling tick over a byte
//! channel that may split, merge or corrupt what it carries. The consumer
//! rebuilds frames with a ring buffer and a magic-header scanner, validates
//! each with an XOR-fold checksum and forwards the records downstream.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte channels (character devices, FIFOs, Unix sockets, shared region)
//! - [`frame`]: Frame codec, ring buffer and streaming deframer
//! - [`node`]: Producer and consumer runtimes (behind `node` feature)

/// Re-export transport types.
pub mod transport {
    pub use sensorlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sensorlink_frame::*;
}

/// Re-export runtime types (requires `node` feature).
#[cfg(feature = "node")]
pub mod node {
    pub use sensorlink_node::*;
}
