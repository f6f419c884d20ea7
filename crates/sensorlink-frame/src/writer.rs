use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use sensorlink_transport::ChannelStream;
use tracing::{trace, warn};

use crate::codec::{encode, FrameConfig, Record, FRAME_LEN};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// How long a half-sent frame may stall before it is abandoned, when no
/// write timeout is configured.
pub const DEFAULT_STALL_BUDGET: Duration = Duration::from_millis(50);

/// Writes whole frames to any `Write` channel.
///
/// If the channel refuses the very first byte with `WouldBlock` the send
/// fails with [`FrameError::ChannelBusy`] and the sample is the caller's to
/// drop. Once part of a frame is out, the rest is retried until the stall
/// budget (`write_timeout`, else [`DEFAULT_STALL_BUDGET`]) runs out; then the
/// send fails with `ChannelBusy` as well and the consumer resynchronises past
/// the truncated frame.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            frames_written: 0,
        }
    }

    /// Encode and send one record.
    pub fn send(&mut self, record: &Record) -> Result<()> {
        self.write_frame(&encode(record))
    }

    /// Send an already encoded frame.
    pub fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<()> {
        let mut offset = 0usize;
        let mut stalled_since: Option<Instant> = None;
        while offset < frame.len() {
            match self.inner.write(&frame[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    stalled_since = None;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock && offset == 0 => {
                    return Err(FrameError::ChannelBusy)
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let since = *stalled_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.stall_budget() {
                        warn!(offset, "channel stalled mid-frame, frame truncated");
                        return Err(FrameError::ChannelBusy);
                    }
                    trace!(offset, "channel full mid-frame, retrying");
                    std::thread::yield_now();
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.frames_written += 1;
        self.flush()
    }

    /// Flush the underlying channel. A flush that keeps reporting
    /// `WouldBlock` past the stall budget fails with `ChannelBusy`.
    pub fn flush(&mut self) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() >= self.stall_budget() {
                        return Err(FrameError::ChannelBusy);
                    }
                    std::thread::yield_now();
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Frames fully handed to the channel so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner channel.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn stall_budget(&self) -> Duration {
        self.config.write_timeout.unwrap_or(DEFAULT_STALL_BUDGET)
    }
}

impl FrameWriter<ChannelStream> {
    /// Create a frame writer for a [`ChannelStream`] and apply the write
    /// timeout from config.
    pub fn with_config_channel(inner: ChannelStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use sensorlink_transport::SharedRegion;

    use super::*;
    use crate::codec::decode_frame;

    fn record(seq: u32) -> Record {
        Record::new(seq, 22.0, 0.0, 0.0, -1.0)
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&record(1)).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), FRAME_LEN);
        assert_eq!(decode_frame(&wire).unwrap(), record(1));
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        for seq in 0..3 {
            writer.send(&record(seq)).unwrap();
        }
        assert_eq!(writer.frames_written(), 3);

        let wire = writer.into_inner().into_inner();
        let seqs: Vec<u32> = wire
            .chunks_exact(FRAME_LEN)
            .map(|chunk| decode_frame(chunk).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(&record(1)).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut writer = FrameWriter::new(InterruptedOnce::default());
        writer.send(&record(5)).unwrap();
        assert_eq!(writer.into_inner().data.len(), FRAME_LEN);
    }

    #[test]
    fn would_block_before_any_byte_is_busy() {
        let (mut region_writer, _reader) = SharedRegion::with_capacity(40).split();
        region_writer.write_all(&[0u8; 20]).unwrap();

        let mut writer = FrameWriter::new(region_writer);
        let err = writer.send(&record(1)).unwrap_err();
        assert!(matches!(err, FrameError::ChannelBusy));
        assert_eq!(writer.frames_written(), 0);
    }

    #[test]
    fn short_stall_mid_frame_is_completed() {
        let mut writer = FrameWriter::new(ChunkyWriter {
            data: Vec::new(),
            calls: 0,
        });
        writer.send(&record(9)).unwrap();

        let inner = writer.into_inner();
        assert_eq!(decode_frame(&inner.data).unwrap(), record(9));
        assert!(inner.calls > 2);
    }

    #[test]
    fn stalled_partial_write_gives_up_as_busy() {
        let cfg = FrameConfig {
            write_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(StalledWriter::default(), cfg);

        let started = Instant::now();
        let err = writer.send(&record(3)).unwrap_err();
        assert!(matches!(err, FrameError::ChannelBusy));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(writer.frames_written(), 0);
        assert_eq!(writer.get_ref().data.len(), 10);
    }

    #[test]
    fn stalled_partial_write_uses_default_budget() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let mut writer = FrameWriter::new(StalledWriter::default());
            let _ = tx.send(writer.send(&record(4)));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("send should return on a stalled channel");
        assert!(matches!(result, Err(FrameError::ChannelBusy)));
    }

    #[test]
    fn stalled_flush_gives_up_as_busy() {
        let cfg = FrameConfig {
            write_timeout: Some(Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(BlockedFlush, cfg);
        assert!(matches!(writer.flush().unwrap_err(), FrameError::ChannelBusy));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(&record(1)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn region_reader_sees_whole_frames() {
        let (region_writer, region_reader) = SharedRegion::with_capacity(256).split();
        let mut writer = FrameWriter::new(region_writer);
        writer.send(&record(1)).unwrap();
        writer.send(&record(2)).unwrap();
        drop(writer);

        let mut reader = crate::reader::FrameReader::new(region_reader);
        assert_eq!(reader.read_record().unwrap(), record(1));
        assert_eq!(reader.read_record().unwrap(), record(2));
        assert!(matches!(
            reader.read_record().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    #[cfg(unix)]
    fn applies_write_timeout_for_channel_stream() {
        let dir = std::env::temp_dir().join(format!(
            "sensorlink-frame-timeout-writer-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("writer.sock");
        let listener = sensorlink_transport::UnixDomainSocket::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let connector = std::thread::spawn(move || {
            sensorlink_transport::UnixDomainSocket::connect(path_clone).unwrap()
        });
        let stream = listener.accept().unwrap();
        let _client = connector.join().unwrap();

        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        assert!(FrameWriter::with_config_channel(stream, cfg).is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InterruptedOnce {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    /// Accepts 10 bytes, then `WouldBlock` once, then the rest.
    struct ChunkyWriter {
        data: Vec<u8>,
        calls: usize,
    }

    impl Write for ChunkyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            match self.calls {
                1 => {
                    let n = buf.len().min(10);
                    self.data.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
                2 => Err(std::io::Error::from(ErrorKind::WouldBlock)),
                _ => {
                    self.data.extend_from_slice(buf);
                    Ok(buf.len())
                }
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Accepts 10 bytes, then reports `WouldBlock` forever.
    #[derive(Default)]
    struct StalledWriter {
        data: Vec<u8>,
    }

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.data.is_empty() {
                let n = buf.len().min(10);
                self.data.extend_from_slice(&buf[..n]);
                return Ok(n);
            }
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BlockedFlush;

    impl Write for BlockedFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
