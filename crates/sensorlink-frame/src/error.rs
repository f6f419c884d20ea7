/// Errors that can occur while framing or deframing sensor records.
///
/// Checksum and magic failures only escape from the strict one-shot
/// [`decode_frame`](crate::codec::decode_frame). The streaming
/// [`Deframer`](crate::deframer::Deframer) resolves them internally.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first word is not the frame magic.
    #[error("invalid frame magic 0x{found:08X} (expected 0x5E7FF7E5)")]
    InvalidMagic { found: u32 },

    /// The trailing checksum does not match the XOR-fold of the frame bytes.
    #[error("checksum mismatch (computed 0x{computed:08X}, received 0x{received:08X})")]
    ChecksumMismatch { computed: u32, received: u32 },

    /// Fewer bytes than one full frame were supplied.
    #[error("truncated frame ({len} bytes, need 28)")]
    Truncated { len: usize },

    /// An append would overwrite unread bytes in the ring buffer.
    #[error("ring buffer overflow ({requested} bytes requested, {free} free)")]
    BufferOverflow { requested: usize, free: usize },

    /// The channel cannot take the frame right now; the sample is dropped.
    #[error("channel busy, frame dropped")]
    ChannelBusy,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was closed by the peer.
    #[error("channel closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

impl FrameError {
    /// True when the error means the peer is gone rather than a transient
    /// condition worth retrying.
    pub fn is_disconnect(&self) -> bool {
        match self {
            FrameError::ConnectionClosed => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
