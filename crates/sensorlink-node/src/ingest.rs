use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sensorlink_frame::{DeframeStats, FrameConfig, FrameError, FrameReader, ReadStatus};
use sensorlink_transport::ChannelStream;
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::sink::{RecordSink, SensorData};

/// Consumer loop configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Sleep between polls when the channel had nothing. Default: 100ms.
    pub poll_interval: Duration,
    /// Ring and channel settings.
    pub frame: FrameConfig,
    /// Stop after delivering this many records.
    pub max_records: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            frame: FrameConfig::default(),
            max_records: None,
        }
    }
}

/// Result of one [`IngestContext::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// This many records were delivered (may be zero if only a partial
    /// frame arrived).
    Delivered(usize),
    /// Nothing arrived.
    Idle,
    /// The peer is gone and nothing deliverable is left.
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub reads: u64,
    pub bytes_read: u64,
    pub read_errors: u64,
    pub records_delivered: u64,
    pub deframe: DeframeStats,
}

/// Consumer context: owns the channel, the ring and the counters.
pub struct IngestContext<R> {
    reader: FrameReader<R>,
    config: IngestConfig,
    stats: IngestStats,
    closed: bool,
}

impl<R: Read> IngestContext<R> {
    pub fn new(channel: R, config: IngestConfig) -> Self {
        Self {
            reader: FrameReader::with_config(channel, config.frame.clone()),
            config,
            stats: IngestStats::default(),
            closed: false,
        }
    }

    /// One read from the channel, then every complete frame in the ring is
    /// delivered, up to the record limit.
    ///
    /// Read errors other than closure are returned after the ring has been
    /// drained of complete frames; the caller decides whether to continue.
    pub fn poll_once<K: RecordSink + ?Sized>(&mut self, sink: &mut K) -> Result<PollStatus> {
        let status = if self.closed {
            ReadStatus::Closed
        } else {
            match self.reader.fill() {
                Ok(status) => status,
                Err(err) => {
                    self.stats.read_errors += 1;
                    self.drain(sink)?;
                    return Err(err.into());
                }
            }
        };

        if let ReadStatus::Data(n) = status {
            self.stats.reads += 1;
            self.stats.bytes_read += n as u64;
        }
        if status == ReadStatus::Closed && !self.closed {
            debug!("channel closed, draining buffered frames");
            self.closed = true;
        }

        let delivered = self.drain(sink)?;
        Ok(match status {
            ReadStatus::Data(_) => PollStatus::Delivered(delivered),
            _ if delivered > 0 => PollStatus::Delivered(delivered),
            ReadStatus::Closed => PollStatus::Closed,
            ReadStatus::Empty => PollStatus::Idle,
        })
    }

    /// Poll until `stop` is set, the channel closes or the record limit is
    /// reached. Read errors are logged and retried after `poll_interval`;
    /// sink errors end the loop.
    pub fn run<K: RecordSink + ?Sized>(
        &mut self,
        sink: &mut K,
        stop: &AtomicBool,
    ) -> Result<IngestStats> {
        info!(
            ring_capacity = self.config.frame.ring_capacity,
            poll_interval = ?self.config.poll_interval,
            "ingest loop starting"
        );
        while !stop.load(Ordering::Relaxed) && !self.limit_reached() {
            match self.poll_once(sink) {
                Ok(PollStatus::Delivered(_)) => {}
                Ok(PollStatus::Idle) => std::thread::sleep(self.config.poll_interval),
                Ok(PollStatus::Closed) => {
                    info!("channel closed by producer");
                    break;
                }
                Err(NodeError::Frame(FrameError::Io(err))) => {
                    warn!(error = %err, "channel read failed");
                    std::thread::sleep(self.config.poll_interval);
                }
                Err(err) => return Err(err),
            }
        }

        let stats = self.stats();
        info!(
            records = stats.records_delivered,
            checksum_failures = stats.deframe.checksum_failures,
            bytes_discarded = stats.deframe.bytes_discarded,
            "ingest loop finished"
        );
        Ok(stats)
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            deframe: self.reader.deframer().stats(),
            ..self.stats
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn drain<K: RecordSink + ?Sized>(&mut self, sink: &mut K) -> Result<usize> {
        let mut delivered = 0;
        while !self.limit_reached() {
            let Some(record) = self.reader.next_record() else {
                break;
            };
            sink.deliver(SensorData::capture(record))?;
            self.stats.records_delivered += 1;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_records
            .is_some_and(|max| self.stats.records_delivered >= max)
    }
}

impl IngestContext<ChannelStream> {
    /// Build a context over a [`ChannelStream`], applying the read timeout
    /// from the frame config.
    pub fn with_channel(channel: ChannelStream, config: IngestConfig) -> Result<Self> {
        channel.set_read_timeout(config.frame.read_timeout)?;
        Ok(Self::new(channel, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};

    use sensorlink_frame::{encode, Record, FRAME_LEN};

    use super::*;
    use crate::sink::FnSink;

    fn frames(seqs: std::ops::Range<u32>) -> Vec<u8> {
        seqs.flat_map(|seq| encode(&Record::new(seq, 25.0, 0.1, 0.2, 0.3)))
            .collect()
    }

    fn quick() -> IngestConfig {
        IngestConfig {
            poll_interval: Duration::from_millis(1),
            ..IngestConfig::default()
        }
    }

    struct Script {
        steps: Vec<std::io::Result<Vec<u8>>>,
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.steps.is_empty() {
                return Err(std::io::Error::from(ErrorKind::UnexpectedEof));
            }
            let bytes = self.steps.remove(0)?;
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }

    #[test]
    fn delivers_each_frame_once_in_order() {
        let mut ctx = IngestContext::new(Cursor::new(frames(0..4)), quick());
        let mut out: Vec<SensorData> = Vec::new();

        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Delivered(4));
        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Idle);
        let seqs: Vec<u32> = out.iter().map(|d| d.frame_no).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn partial_frame_delivers_nothing_yet() {
        let wire = frames(7..8);
        let mut ctx = IngestContext::new(
            Script {
                steps: vec![Ok(wire[..10].to_vec()), Ok(wire[10..].to_vec())],
            },
            quick(),
        );
        let mut out: Vec<SensorData> = Vec::new();
        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Delivered(0));
        assert!(out.is_empty());
        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Delivered(1));
        assert_eq!(out[0].frame_no, 7);
        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Closed);
    }

    #[test]
    fn run_survives_read_errors_and_stops_on_close() {
        let wire = frames(0..3);
        let mut ctx = IngestContext::new(
            Script {
                steps: vec![
                    Ok(wire[..30].to_vec()),
                    Err(std::io::Error::from(ErrorKind::PermissionDenied)),
                    Err(std::io::Error::from(ErrorKind::WouldBlock)),
                    Ok(wire[30..].to_vec()),
                ],
            },
            quick(),
        );
        let mut out: Vec<SensorData> = Vec::new();
        let stop = AtomicBool::new(false);
        let stats = ctx.run(&mut out, &stop).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(stats.records_delivered, 3);
        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.bytes_read, 3 * FRAME_LEN as u64);
        assert_eq!(stats.deframe.frames_emitted, 3);
    }

    #[test]
    fn run_honours_record_limit() {
        let config = IngestConfig {
            max_records: Some(2),
            ..quick()
        };
        let mut ctx = IngestContext::new(Cursor::new(frames(0..5)), config);
        let mut out: Vec<SensorData> = Vec::new();
        let stop = AtomicBool::new(false);
        let stats = ctx.run(&mut out, &stop).unwrap();
        assert_eq!(stats.records_delivered, 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn run_returns_immediately_when_stopped() {
        let mut ctx = IngestContext::new(Cursor::new(frames(0..2)), quick());
        let mut out: Vec<SensorData> = Vec::new();
        let stop = AtomicBool::new(true);
        ctx.run(&mut out, &stop).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn sink_error_ends_run() {
        let mut ctx = IngestContext::new(Cursor::new(frames(0..2)), quick());
        let mut sink = FnSink(|_d: SensorData| -> Result<()> {
            Err(NodeError::Sink("downstream unavailable".into()))
        });
        let stop = AtomicBool::new(false);
        let err = ctx.run(&mut sink, &stop).unwrap_err();
        assert!(matches!(err, NodeError::Sink(_)));
    }

    #[test]
    fn read_error_still_delivers_buffered_frames() {
        let wire = frames(0..2);
        let mut ctx = IngestContext::new(
            Script {
                steps: vec![
                    Ok(wire.clone()),
                    Err(std::io::Error::from(ErrorKind::PermissionDenied)),
                ],
            },
            IngestConfig {
                max_records: Some(1),
                ..quick()
            },
        );
        let mut out: Vec<SensorData> = Vec::new();
        assert_eq!(ctx.poll_once(&mut out).unwrap(), PollStatus::Delivered(1));

        ctx.config.max_records = None;
        let err = ctx.poll_once(&mut out).unwrap_err();
        assert!(matches!(err, NodeError::Frame(FrameError::Io(_))));
        let seqs: Vec<u32> = out.iter().map(|d| d.frame_no).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(ctx.stats().read_errors, 1);
    }

    #[test]
    fn corrupt_frames_are_counted_not_delivered() {
        let mut wire = frames(0..3);
        wire[FRAME_LEN + 12] ^= 0x01;
        let mut ctx = IngestContext::new(Cursor::new(wire), quick());
        let mut out: Vec<SensorData> = Vec::new();
        ctx.poll_once(&mut out).unwrap();

        let seqs: Vec<u32> = out.iter().map(|d| d.frame_no).collect();
        assert_eq!(seqs, vec![0, 2]);
        assert_eq!(ctx.stats().deframe.checksum_failures, 1);
    }
}
