use crate::error::{FrameError, Result};

/// Fixed-capacity circular byte store.
///
/// Holds no framing semantics of its own: it only tracks where the next byte
/// goes (write cursor), where the oldest unread byte is (read cursor) and how
/// many unread bytes there are (occupancy). Allocated once, never resized.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    write: usize,
    read: usize,
    len: usize,
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            write: 0,
            read: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Occupancy: unread bytes currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes that can be appended without overwriting unread data.
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Copy `bytes` in at the write cursor, wrapping at capacity.
    ///
    /// Callers size their reads by [`free`](Self::free). A call that would
    /// overwrite unread bytes is refused with
    /// [`FrameError::BufferOverflow`] and leaves the ring untouched.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.free() {
            return Err(FrameError::BufferOverflow {
                requested: bytes.len(),
                free: self.free(),
            });
        }

        let capacity = self.capacity();
        let first = bytes.len().min(capacity - self.write);
        self.buf[self.write..self.write + first].copy_from_slice(&bytes[..first]);
        self.buf[..bytes.len() - first].copy_from_slice(&bytes[first..]);

        self.write = (self.write + bytes.len()) % capacity;
        self.len += bytes.len();
        Ok(())
    }

    /// Copy `dst.len()` bytes starting `offset` bytes after the read cursor,
    /// wrapping at capacity. Does not change any cursor.
    ///
    /// # Panics
    /// Panics if the window reaches past the unread bytes.
    pub fn read_window(&self, offset: usize, dst: &mut [u8]) {
        assert!(
            offset + dst.len() <= self.len,
            "window {offset}+{} exceeds occupancy {}",
            dst.len(),
            self.len
        );

        let capacity = self.capacity();
        let start = (self.read + offset) % capacity;
        let first = dst.len().min(capacity - start);
        let (head, tail) = dst.split_at_mut(first);
        head.copy_from_slice(&self.buf[start..start + first]);
        tail.copy_from_slice(&self.buf[..tail.len()]);
    }

    /// Consume `n` bytes: move the read cursor forward and shrink occupancy.
    ///
    /// # Panics
    /// Panics if `n` exceeds occupancy; that is a caller bug, not a channel
    /// condition.
    pub fn advance_read(&mut self, n: usize) {
        assert!(
            n <= self.len,
            "advance {n} exceeds occupancy {}",
            self.len
        );
        self.read = (self.read + n) % self.capacity();
        self.len -= n;
    }

    /// Drop every unread byte.
    pub fn clear(&mut self) {
        self.read = self.write;
        self.len = 0;
    }
}
