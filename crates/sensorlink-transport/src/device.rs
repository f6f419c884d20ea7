//! Character devices and FIFOs opened as channels.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::ChannelStream;

/// How a device channel is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// Open a character device or FIFO as a channel.
///
/// On Unix the descriptor is opened with `O_NONBLOCK | O_NOCTTY`: an idle
/// device reports `WouldBlock` rather than blocking the ingest loop, and a tty
/// device never becomes the controlling terminal. Failure to open is fatal for
/// the caller and reported as [`TransportError::Open`].
pub fn open_device(path: impl AsRef<Path>, access: Access) -> Result<ChannelStream> {
    let path = path.as_ref();
    let mut options = OpenOptions::new();
    match access {
        Access::Read => options.read(true),
        Access::Write => options.write(true),
        Access::ReadWrite => options.read(true).write(true),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY);
    }

    let file = options.open(path).map_err(|source| TransportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, ?access, "opened device channel");
    Ok(ChannelStream::from_device(file))
}
