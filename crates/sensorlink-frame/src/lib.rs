//! Fixed-layout sensor frames and the streaming deframer that recovers them.
//!
//! Every sample crosses the channel as one 28-byte frame:
//! - A 4-byte magic header (`0x5E7FF7E5`, little-endian) for resynchronisation
//! - A 4-byte sequence number
//! - Four IEEE-754 single-precision sample fields
//! - A 4-byte XOR-fold checksum of the preceding 24 bytes
//!
//! The consumer side appends whatever the channel delivers to a fixed
//! [`RingBuffer`] and lets the [`Deframer`] find, validate and commit frames,
//! skipping corrupt or misaligned bytes deterministically.

pub mod codec;
pub mod deframer;
pub mod error;
pub mod reader;
pub mod ring;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode, decode_frame, encode, encode_frame, xor_fold, DecodedFrame, FrameConfig, Record,
    CHECKSUM_OFFSET, DEFAULT_RING_CAPACITY, FRAME_LEN, MAGIC, MAGIC_BYTES, WORD_SIZE,
};
pub use deframer::{DeframeOutcome, DeframeStats, Deframer};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, ReadStatus};
pub use ring::RingBuffer;
pub use writer::{FrameWriter, DEFAULT_STALL_BUDGET};

#[cfg(feature = "async")]
pub use tokio_codec::RecordCodec;
