//! `tokio_util::codec` adapter so records can be used with `FramedRead` and
//! `FramedWrite` over async byte streams.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Record, DEFAULT_RING_CAPACITY};
use crate::deframer::{DeframeOutcome, DeframeStats, Deframer};
use crate::error::FrameError;

/// Record codec backed by the same [`Deframer`] as the blocking reader.
///
/// Bytes move from the framed read buffer into the ring only as fast as the
/// ring has room, so the resync behaviour is identical to [`FrameReader`].
///
/// [`FrameReader`]: crate::reader::FrameReader
#[derive(Debug, Clone)]
pub struct RecordCodec {
    deframer: Deframer,
}

impl RecordCodec {
    pub fn new() -> Self {
        Self::with_ring_capacity(DEFAULT_RING_CAPACITY)
    }

    pub fn with_ring_capacity(capacity: usize) -> Self {
        Self {
            deframer: Deframer::new(capacity),
        }
    }

    pub fn stats(&self) -> DeframeStats {
        self.deframer.stats()
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, FrameError> {
        loop {
            let take = src.len().min(self.deframer.free());
            if take > 0 {
                self.deframer.append(&src[..take])?;
                src.advance(take);
            }

            match self.deframer.scan() {
                DeframeOutcome::Emitted(record, _) => return Ok(Some(record)),
                DeframeOutcome::SkippedCorrupt(_) => continue,
                DeframeOutcome::InsufficientData if src.is_empty() => return Ok(None),
                DeframeOutcome::InsufficientData => continue,
            }
        }
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = FrameError;

    fn encode(&mut self, record: Record, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&record, dst);
        Ok(())
    }
}
