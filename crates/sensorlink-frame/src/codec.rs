use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame start marker.
pub const MAGIC: u32 = 0x5E7F_F7E5;

/// Magic as it appears on the wire: `E5 F7 7F 5E`.
pub const MAGIC_BYTES: [u8; 4] = MAGIC.to_le_bytes();

/// Every frame field is one little-endian 32-bit word.
pub const WORD_SIZE: usize = 4;

/// Seven words: magic, sequence, four samples, checksum.
pub const FRAME_LEN: usize = 7 * WORD_SIZE;

/// Offset of the checksum word; the checksum covers `[0, CHECKSUM_OFFSET)`.
pub const CHECKSUM_OFFSET: usize = FRAME_LEN - WORD_SIZE;

/// Default consumer ring size, enough for 18 frames in flight.
pub const DEFAULT_RING_CAPACITY: usize = 512;

/// One sensor sample as carried by a frame.
///
/// Equality is bit-exact: two records are equal when every float field has
/// the same bit pattern, so `NaN` payloads compare equal to themselves and
/// `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Copy)]
pub struct Record {
    /// Producer sequence number, wraps at 2^32.
    pub seq: u32,
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Angular velocity around X, degrees per second.
    pub gyro_x: f32,
    /// Angular velocity around Y, degrees per second.
    pub gyro_y: f32,
    /// Angular velocity around Z, degrees per second.
    pub gyro_z: f32,
}

impl Record {
    pub fn new(seq: u32, temperature: f32, gyro_x: f32, gyro_y: f32, gyro_z: f32) -> Self {
        Self {
            seq,
            temperature,
            gyro_x,
            gyro_y,
            gyro_z,
        }
    }

    fn bits(&self) -> [u32; 5] {
        [
            self.seq,
            self.temperature.to_bits(),
            self.gyro_x.to_bits(),
            self.gyro_y.to_bits(),
            self.gyro_z.to_bits(),
        ]
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Record {}

/// XOR of every byte in `bytes`.
pub fn xor_fold(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

pub(crate) fn word_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Little-endian bit pattern to float. Never reinterprets memory.
pub(crate) fn f32_from_le_word(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(word_le(bytes, offset))
}

/// Serialize a record into its 28-byte wire form.
///
/// Wire format (all words little-endian):
/// ```text
/// ┌────────┬────────┬────────┬────────┬────────┬────────┬──────────┐
/// │ magic  │ seq    │ temp   │ gyro_x │ gyro_y │ gyro_z │ checksum │
/// │ 0..4   │ 4..8   │ 8..12  │ 12..16 │ 16..20 │ 20..24 │ 24..28   │
/// └────────┴────────┴────────┴────────┴────────┴────────┴──────────┘
/// ```
/// The checksum is computed over the serialized bytes, never over an
/// in-memory struct, so the layout is the same on every host.
pub fn encode(record: &Record) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    let words = [
        MAGIC,
        record.seq,
        record.temperature.to_bits(),
        record.gyro_x.to_bits(),
        record.gyro_y.to_bits(),
        record.gyro_z.to_bits(),
    ];
    for (chunk, word) in frame.chunks_exact_mut(WORD_SIZE).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    let checksum = u32::from(xor_fold(&frame[..CHECKSUM_OFFSET]));
    frame[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
    frame
}

/// Append the wire form of `record` to `dst`.
pub fn encode_frame(record: &Record, dst: &mut BytesMut) {
    dst.reserve(FRAME_LEN);
    dst.put_slice(&encode(record));
}

/// A frame parsed without judgement, plus what is needed to judge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// The sample fields.
    pub record: Record,
    /// First word as received.
    pub header: u32,
    /// Checksum word as received.
    pub checksum: u32,
    /// XOR-fold recomputed over the received header and payload bytes.
    pub computed: u32,
}

impl DecodedFrame {
    /// True when the header is the magic and the checksum matches.
    pub fn is_valid(&self) -> bool {
        self.header == MAGIC && self.checksum == self.computed
    }
}

/// Parse 28 bytes into their fields and recompute the checksum.
///
/// Pure; the deframer uses the same function on the bytes it peeks out of
/// its ring buffer.
pub fn decode(frame: &[u8; FRAME_LEN]) -> DecodedFrame {
    DecodedFrame {
        record: Record {
            seq: word_le(frame, 4),
            temperature: f32_from_le_word(frame, 8),
            gyro_x: f32_from_le_word(frame, 12),
            gyro_y: f32_from_le_word(frame, 16),
            gyro_z: f32_from_le_word(frame, 20),
        },
        header: word_le(frame, 0),
        checksum: word_le(frame, CHECKSUM_OFFSET),
        computed: u32::from(xor_fold(&frame[..CHECKSUM_OFFSET])),
    }
}

/// Strictly decode a frame that is expected to start at `src[0]`.
///
/// Bytes past the first 28 are ignored.
pub fn decode_frame(src: &[u8]) -> Result<Record> {
    let frame: &[u8; FRAME_LEN] = src
        .get(..FRAME_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(FrameError::Truncated { len: src.len() })?;

    let decoded = decode(frame);
    if decoded.header != MAGIC {
        return Err(FrameError::InvalidMagic {
            found: decoded.header,
        });
    }
    if decoded.checksum != decoded.computed {
        return Err(FrameError::ChecksumMismatch {
            computed: decoded.computed,
            received: decoded.checksum,
        });
    }
    Ok(decoded.record)
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Consumer ring buffer capacity in bytes. Default: 512.
    pub ring_capacity: usize,
    /// Largest single channel read in bytes; always further capped by free
    /// ring space. Default: 512.
    pub read_chunk: usize,
    /// Read timeout applied to stream channels.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout applied to stream channels.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            read_chunk: DEFAULT_RING_CAPACITY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
