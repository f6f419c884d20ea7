//! Byte channels between a sensor producer and its consumer.
//!
//! Every channel here delivers bytes verbatim and in order, but with no
//! framing guarantees: a read may return any slice of what was written.
//! - Character devices and FIFOs (e.g. `/dev/ttyRPMSG0`)
//! - Unix domain sockets (Linux/macOS)
//! - An in-process shared region with one writer and one reader
//!
//! This is the lowest layer of sensorlink. Framing lives in
//! `sensorlink-frame`.

pub mod device;
pub mod error;
pub mod region;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use device::{open_device, Access};
pub use error::{Result, TransportError};
pub use region::{RegionReader, RegionWriter, SharedRegion};
pub use traits::ChannelStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
