use std::io::{ErrorKind, Read};

use sensorlink_transport::ChannelStream;
use tracing::{debug, trace};

use crate::codec::{FrameConfig, Record};
use crate::deframer::Deframer;
use crate::error::{FrameError, Result};

/// What one channel read produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were appended to the ring.
    Data(usize),
    /// The channel had nothing to offer right now, or the ring is full.
    Empty,
    /// The peer is gone; no more bytes will arrive.
    Closed,
}

/// Pulls bytes from a channel into a [`Deframer`] and hands out records.
///
/// Reads are never larger than the free space in the ring, so no byte the
/// channel delivers is ever lost to overflow.
pub struct FrameReader<T> {
    inner: T,
    deframer: Deframer,
    scratch: Box<[u8]>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    ///
    /// # Panics
    /// Panics if `config.ring_capacity` cannot hold one frame.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let chunk = config.read_chunk.clamp(1, config.ring_capacity.max(1));
        Self {
            inner,
            deframer: Deframer::new(config.ring_capacity),
            scratch: vec![0u8; chunk].into_boxed_slice(),
            config,
        }
    }

    /// Perform at most one channel read into the ring.
    ///
    /// `Interrupted` is retried. Zero-byte reads, `WouldBlock` and `TimedOut`
    /// map to [`ReadStatus::Empty`]; `UnexpectedEof`, `BrokenPipe` and
    /// `ConnectionReset` map to [`ReadStatus::Closed`]. Anything else is
    /// returned as [`FrameError::Io`] and leaves the ring unchanged.
    pub fn fill(&mut self) -> Result<ReadStatus> {
        let want = self.deframer.free().min(self.scratch.len());
        if want == 0 {
            trace!("ring full, skipping channel read");
            return Ok(ReadStatus::Empty);
        }

        loop {
            match self.inner.read(&mut self.scratch[..want]) {
                Ok(0) => return Ok(ReadStatus::Empty),
                Ok(n) => {
                    self.deframer.append(&self.scratch[..n])?;
                    trace!(bytes = n, buffered = self.deframer.buffered(), "channel read");
                    return Ok(ReadStatus::Data(n));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(ReadStatus::Empty)
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::UnexpectedEof
                            | ErrorKind::BrokenPipe
                            | ErrorKind::ConnectionReset
                    ) =>
                {
                    debug!(error = %err, "channel closed by peer");
                    return Ok(ReadStatus::Closed);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Next record already in the ring, without touching the channel.
    pub fn next_record(&mut self) -> Option<Record> {
        self.deframer.next_record()
    }

    /// Read until one record validates (blocking on the channel's terms).
    ///
    /// Spins on an idle non-blocking channel; callers that need pacing use
    /// [`fill`](Self::fill) and [`next_record`](Self::next_record) directly.
    /// Returns [`FrameError::ConnectionClosed`] once the peer is gone and no
    /// complete frame remains buffered.
    pub fn read_record(&mut self) -> Result<Record> {
        loop {
            if let Some(record) = self.deframer.next_record() {
                return Ok(record);
            }
            match self.fill()? {
                ReadStatus::Data(_) => {}
                ReadStatus::Empty => std::thread::yield_now(),
                ReadStatus::Closed => return Err(FrameError::ConnectionClosed),
            }
        }
    }

    /// Borrow the deframer, e.g. for its statistics.
    pub fn deframer(&self) -> &Deframer {
        &self.deframer
    }

    /// Mutably borrow the deframer.
    pub fn deframer_mut(&mut self) -> &mut Deframer {
        &mut self.deframer
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner channel. Buffered bytes are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<ChannelStream> {
    /// Create a frame reader for a [`ChannelStream`] and apply the read
    /// timeout from config.
    pub fn with_config_channel(inner: ChannelStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: sensorlink_transport::TransportError) -> FrameError {
    use sensorlink_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Open { source, .. }
        | TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
