//! In-process shared byte region with one writer and one reader.
//!
//! Models the cache-bypassing memory window a producer core shares with its
//! consumer. Visibility contract: a write is published to the reader only once
//! the whole chunk has been copied in. Publication happens under the region
//! lock, so the reader never observes a half-written chunk.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

struct RegionState {
    bytes: VecDeque<u8>,
    capacity: usize,
    writer_alive: bool,
    published_chunks: u64,
}

/// A bounded byte region that is split into its two exclusive halves.
pub struct SharedRegion {
    state: Arc<Mutex<RegionState>>,
}

impl SharedRegion {
    /// Allocate a region holding at most `capacity` unread bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegionState {
                bytes: VecDeque::with_capacity(capacity),
                capacity,
                writer_alive: true,
                published_chunks: 0,
            })),
        }
    }

    /// Split into the exclusive writer and reader halves.
    pub fn split(self) -> (RegionWriter, RegionReader) {
        let writer = RegionWriter {
            state: Arc::clone(&self.state),
        };
        let reader = RegionReader { state: self.state };
        (writer, reader)
    }
}

fn lock(state: &Mutex<RegionState>) -> std::io::Result<MutexGuard<'_, RegionState>> {
    state
        .lock()
        .map_err(|_| std::io::Error::other("shared region lock poisoned"))
}

/// Producer half. Each `write` publishes the whole chunk or nothing.
pub struct RegionWriter {
    state: Arc<Mutex<RegionState>>,
}

impl RegionWriter {
    /// Bytes that can be published right now.
    pub fn free(&self) -> usize {
        lock(&self.state)
            .map(|s| s.capacity - s.bytes.len())
            .unwrap_or(0)
    }
}

impl Write for RegionWriter {
    /// Publishes `buf` atomically.
    ///
    /// Returns `WouldBlock` without publishing anything when the chunk does
    /// not fit; the region never holds a truncated chunk.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = lock(&self.state)?;
        let free = state.capacity - state.bytes.len();
        if buf.len() > free {
            return Err(std::io::Error::new(
                ErrorKind::WouldBlock,
                format!("shared region full ({} bytes requested, {free} free)", buf.len()),
            ));
        }
        state.bytes.extend(buf.iter().copied());
        state.published_chunks += 1;
        trace!(len = buf.len(), "published chunk to shared region");
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for RegionWriter {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.writer_alive = false;
        }
    }
}

/// Consumer half.
pub struct RegionReader {
    state: Arc<Mutex<RegionState>>,
}

impl RegionReader {
    /// Unread bytes currently published.
    pub fn available(&self) -> usize {
        lock(&self.state).map(|s| s.bytes.len()).unwrap_or(0)
    }

    /// Number of chunks the writer has published so far.
    pub fn published_chunks(&self) -> u64 {
        lock(&self.state).map(|s| s.published_chunks).unwrap_or(0)
    }
}

impl Read for RegionReader {
    /// Returns `Ok(0)` while the region is empty and the writer is alive,
    /// `BrokenPipe` once the writer is gone and everything has been drained.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = lock(&self.state)?;
        if state.bytes.is_empty() {
            if state.writer_alive {
                return Ok(0);
            }
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "shared region writer closed",
            ));
        }

        let n = buf.len().min(state.bytes.len());
        for (dst, src) in buf.iter_mut().zip(state.bytes.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_reads_zero() {
        let (_writer, mut reader) = SharedRegion::with_capacity(16).split();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn chunks_arrive_in_order_and_may_be_split_by_reader() {
        let (mut writer, mut reader) = SharedRegion::with_capacity(16).split();
        writer.write_all(&[1, 2, 3]).unwrap();
        writer.write_all(&[4, 5]).unwrap();
        assert_eq!(reader.published_chunks(), 2);
        assert_eq!(reader.available(), 5);

        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        let mut rest = [0u8; 8];
        let n = reader.read(&mut rest).unwrap();
        assert_eq!(&rest[..n], &[3, 4, 5]);
    }

    #[test]
    fn oversized_chunk_is_rejected_whole() {
        let (mut writer, reader) = SharedRegion::with_capacity(8).split();
        writer.write_all(&[0xAA; 6]).unwrap();
        assert_eq!(writer.free(), 2);

        let err = writer.write(&[0xBB; 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert_eq!(reader.available(), 6);
    }

    #[test]
    fn drained_region_reports_broken_pipe_after_writer_drop() {
        let (mut writer, mut reader) = SharedRegion::with_capacity(8).split();
        writer.write_all(&[9, 9]).unwrap();
        drop(writer);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn writer_and_reader_on_separate_threads() {
        let (mut writer, mut reader) = SharedRegion::with_capacity(64).split();

        let producer = std::thread::spawn(move || {
            for i in 0..32u8 {
                loop {
                    match writer.write(&[i, i]) {
                        Ok(_) => break,
                        Err(err) if err.kind() == ErrorKind::WouldBlock => {
                            std::thread::yield_now()
                        }
                        Err(err) => panic!("unexpected write error: {err}"),
                    }
                }
            }
        });

        let mut received = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => std::thread::yield_now(),
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::BrokenPipe => break,
                Err(err) => panic!("unexpected read error: {err}"),
            }
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..32u8).flat_map(|i| [i, i]).collect();
        assert_eq!(received, expected);
    }
}
