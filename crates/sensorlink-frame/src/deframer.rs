use tracing::{debug, trace, warn};

use crate::codec::{decode, Record, FRAME_LEN, MAGIC_BYTES, WORD_SIZE};
use crate::error::Result;
use crate::ring::RingBuffer;

/// Result of one [`Deframer::scan`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeframeOutcome {
    /// A frame validated; the record and the bytes it occupied.
    Emitted(Record, usize),
    /// A header matched but the checksum did not. Carries every byte dropped
    /// during the call: leading non-header bytes plus the 4-byte header.
    SkippedCorrupt(usize),
    /// Fewer than one frame of bytes remains. Nothing unscanned was dropped.
    InsufficientData,
}

/// Running counters for one deframer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframeStats {
    /// Frames that validated and were emitted.
    pub frames_emitted: u64,
    /// Header matches rejected by the checksum.
    pub checksum_failures: u64,
    /// Bytes dropped while resynchronising.
    pub bytes_discarded: u64,
}

/// Streaming frame scanner over a ring buffer it owns.
///
/// Bytes go in through [`append`](Self::append) in whatever chunks the
/// channel produced; [`scan`](Self::scan) then finds frame boundaries by
/// looking for the magic header and validating the checksum.
///
/// Resynchronisation is byte-at-a-time: a position whose first word is not
/// the magic is dropped one byte at a time, and a header whose checksum fails
/// is dropped by exactly the header width, since the real frame may begin
/// inside the rejected window. Every decision is committed to the read cursor
/// as soon as it is made, so the scan position never outlives the bytes it
/// refers to and a call can be resumed after any append.
#[derive(Debug, Clone)]
pub struct Deframer {
    ring: RingBuffer,
    stats: DeframeStats,
}

impl Deframer {
    /// Create a deframer with a fresh ring of `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity` cannot hold one frame.
    pub fn new(capacity: usize) -> Self {
        Self::with_ring(RingBuffer::with_capacity(capacity))
    }

    /// Take over an existing ring, including any bytes already in it.
    ///
    /// # Panics
    /// Panics if the ring cannot hold one frame.
    pub fn with_ring(ring: RingBuffer) -> Self {
        assert!(
            ring.capacity() >= FRAME_LEN,
            "ring capacity {} is smaller than one frame",
            ring.capacity()
        );
        Self {
            ring,
            stats: DeframeStats::default(),
        }
    }

    /// Append channel bytes. See [`RingBuffer::append`].
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.ring.append(bytes)
    }

    /// Bytes that may be appended right now.
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Bytes buffered and not yet consumed or discarded.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn stats(&self) -> DeframeStats {
        self.stats
    }

    /// Drop everything buffered, e.g. after the producer restarted.
    pub fn reset(&mut self) {
        self.stats.bytes_discarded += self.ring.len() as u64;
        self.ring.clear();
    }

    /// Try to extract one frame.
    ///
    /// Call repeatedly until [`DeframeOutcome::InsufficientData`], then
    /// append more bytes. Corrupt and misaligned input is handled here and
    /// never reported as an error.
    pub fn scan(&mut self) -> DeframeOutcome {
        let mut skipped = 0usize;

        while self.ring.len() >= FRAME_LEN {
            let mut header = [0u8; WORD_SIZE];
            self.ring.read_window(0, &mut header);
            if header != MAGIC_BYTES {
                self.discard(1);
                skipped += 1;
                continue;
            }

            let mut frame = [0u8; FRAME_LEN];
            self.ring.read_window(0, &mut frame);
            let decoded = decode(&frame);

            if decoded.is_valid() {
                self.ring.advance_read(FRAME_LEN);
                self.stats.frames_emitted += 1;
                if skipped > 0 {
                    debug!(skipped, "resynchronised on frame header");
                }
                trace!(seq = decoded.record.seq, "frame emitted");
                return DeframeOutcome::Emitted(decoded.record, FRAME_LEN);
            }

            warn!(
                computed = decoded.computed,
                received = decoded.checksum,
                "frame checksum mismatch, skipping header"
            );
            self.discard(WORD_SIZE);
            self.stats.checksum_failures += 1;
            return DeframeOutcome::SkippedCorrupt(skipped + WORD_SIZE);
        }

        if skipped > 0 {
            trace!(skipped, buffered = self.ring.len(), "scanned to end of data");
        }
        DeframeOutcome::InsufficientData
    }

    /// Scan until a frame is emitted or the data runs out.
    pub fn next_record(&mut self) -> Option<Record> {
        loop {
            match self.scan() {
                DeframeOutcome::Emitted(record, _) => return Some(record),
                DeframeOutcome::SkippedCorrupt(_) => continue,
                DeframeOutcome::InsufficientData => return None,
            }
        }
    }

    fn discard(&mut self, n: usize) {
        self.ring.advance_read(n);
        self.stats.bytes_discarded += n as u64;
    }
}
