use std::fs::File;
use std::io::{ErrorKind, Read, Write};

use crate::error::Result;

/// An open byte channel implementing Read + Write.
///
/// Read semantics are normalised across channel kinds so the consumer's
/// ingest loop can treat them uniformly:
/// - `Ok(0)` or `WouldBlock` means "no data yet"
/// - `UnexpectedEof` means the peer closed a stream-oriented channel
///
/// Character devices are opened non-blocking, so an idle device reports
/// `WouldBlock` instead of parking the caller.
pub struct ChannelStream {
    inner: ChannelInner,
}

enum ChannelInner {
    Device(File),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for ChannelStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ChannelInner::Device(file) => file.read(buf),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => match stream.read(buf) {
                // A socket reports EOF as a zero-length read; keep zero reserved for "idle".
                Ok(0) if !buf.is_empty() => Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "peer closed the stream",
                )),
                other => other,
            },
        }
    }
}

impl Write for ChannelStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ChannelInner::Device(file) => file.write(buf),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ChannelInner::Device(file) => file.flush(),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream.flush(),
        }
    }
}

impl ChannelStream {
    pub(crate) fn from_device(file: File) -> Self {
        Self {
            inner: ChannelInner::Device(file),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ChannelInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Devices are already non-blocking, so this is a no-op for them.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            ChannelInner::Device(_) => Ok(()),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            ChannelInner::Device(_) => Ok(()),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Switch a stream channel between blocking and non-blocking mode.
    ///
    /// Devices are always non-blocking. Clones share the setting.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            ChannelInner::Device(_) => Ok(()),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
        }
    }

    /// Try to clone this channel (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            ChannelInner::Device(file) => Ok(Self::from_device(file.try_clone()?)),
            #[cfg(unix)]
            ChannelInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Channel kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            ChannelInner::Device(_) => "device",
            #[cfg(unix)]
            ChannelInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl std::fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStream")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{ErrorKind, Read, Write};

    use super::*;

    #[test]
    fn unix_eof_is_reported_as_unexpected_eof() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = ChannelStream::from_unix(right);
        drop(left);

        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn unix_stream_passes_bytes_through() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = ChannelStream::from_unix(left);
        let mut reader = ChannelStream::from_unix(right);

        writer.write_all(&[0xE5, 0xF7, 0x7F, 0x5E]).unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xE5, 0xF7, 0x7F, 0x5E]);
        assert_eq!(reader.kind(), "unix-domain-socket");
    }

    #[test]
    fn unix_read_timeout_surfaces_as_would_block() {
        let (_left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = ChannelStream::from_unix(right);
        reader
            .set_read_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();

        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn nonblocking_idle_read_would_block() {
        let (_left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = ChannelStream::from_unix(right);
        reader.set_nonblocking(true).unwrap();

        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn debug_names_the_kind() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = ChannelStream::from_unix(left);
        assert!(format!("{stream:?}").contains("unix-domain-socket"));
    }
}
