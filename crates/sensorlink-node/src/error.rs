/// Errors that can occur in the producer and consumer runtimes.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sensorlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sensorlink_frame::FrameError),

    /// A downstream sink refused a record.
    #[error("sink error: {0}")]
    Sink(String),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error outside the frame layer (command channel, sink output).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// True when the channel peer is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            NodeError::Frame(err) => err.is_disconnect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Why a command line was rejected. Rejected commands are logged and
/// ignored; nothing is acknowledged to the sender.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Text that matches no command token.
    #[error("unknown command: {0:?}")]
    Unknown(String),

    /// `SAMPERIOD:` followed by something that is not a decimal number.
    #[error("invalid sample period: {0:?}")]
    InvalidPeriod(String),
}
