use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::str::FromStr;
use std::sync::mpsc;

use tracing::{debug, warn};

use crate::error::{CommandError, Result};

/// Longest sample period a peer may request, in seconds.
pub const MAX_SAMPLE_PERIOD_SECS: u32 = 60;

/// Longest command line kept while waiting for its newline.
const MAX_LINE_LEN: usize = 256;

const PERIOD_PREFIX: &str = "SAMPERIOD:";

/// Control command sent from the consumer to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin sampling with the default period and a fresh sequence.
    Start,
    /// Stop sampling.
    Stop,
    /// Re-initialise the sampler and the sequence, keeping the period.
    Restart,
    /// Log the producer's state.
    Debug,
    /// Change the sample period, in whole seconds (1..=60).
    SamplePeriod(u32),
}

impl Command {
    /// Parse one command. Trailing CR, LF and NUL bytes are ignored; the
    /// tokens themselves are case-sensitive and must match exactly.
    ///
    /// `SAMPERIOD:` values above [`MAX_SAMPLE_PERIOD_SECS`] are clamped to it
    /// and zero is raised to one second.
    pub fn parse(text: &str) -> std::result::Result<Self, CommandError> {
        let text = text.trim_end_matches(['\r', '\n', '\0']);
        match text {
            "START" => Ok(Command::Start),
            "STOP" => Ok(Command::Stop),
            "RESTART" => Ok(Command::Restart),
            "DEBUG" => Ok(Command::Debug),
            _ => match text.strip_prefix(PERIOD_PREFIX) {
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(|secs| {
                        Command::SamplePeriod(clamp_period(
                            u32::try_from(secs).unwrap_or(u32::MAX),
                        ))
                    })
                    .map_err(|_| CommandError::InvalidPeriod(value.to_string())),
                None => Err(CommandError::Unknown(text.to_string())),
            },
        }
    }
}

/// Clamp a requested period into `1..=MAX_SAMPLE_PERIOD_SECS`.
pub(crate) fn clamp_period(secs: u32) -> u32 {
    secs.clamp(1, MAX_SAMPLE_PERIOD_SECS)
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Command::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => f.write_str("START"),
            Command::Stop => f.write_str("STOP"),
            Command::Restart => f.write_str("RESTART"),
            Command::Debug => f.write_str("DEBUG"),
            Command::SamplePeriod(secs) => write!(f, "{PERIOD_PREFIX}{secs}"),
        }
    }
}

/// Write `command` as one newline-terminated line.
pub fn send_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let line = format!("{command}\n");
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    debug!(%command, "command sent");
    Ok(())
}

/// Anything the producer can poll for pending commands between ticks.
pub trait CommandSource {
    /// Commands that arrived since the last poll. Never blocks.
    fn poll_commands(&mut self) -> Vec<Command>;
}

/// No command channel at all.
impl CommandSource for () {
    fn poll_commands(&mut self) -> Vec<Command> {
        Vec::new()
    }
}

/// In-process control, e.g. from a test or a supervising thread.
impl CommandSource for mpsc::Receiver<Command> {
    fn poll_commands(&mut self) -> Vec<Command> {
        self.try_iter().collect()
    }
}

/// Splits a non-blocking byte stream into newline-delimited commands.
pub struct CommandReader<R> {
    inner: R,
    pending: Vec<u8>,
    discarding: bool,
    closed: bool,
}

impl<R: Read> CommandReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(MAX_LINE_LEN),
            discarding: false,
            closed: false,
        }
    }

    /// Read everything available right now and return the complete,
    /// valid commands in arrival order.
    ///
    /// Zero-byte reads and `WouldBlock` end the poll. Once the peer closes,
    /// an unterminated final line is still parsed and later polls return
    /// nothing. Invalid lines are logged and skipped.
    pub fn poll(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        let mut buf = [0u8; MAX_LINE_LEN];

        while !self.closed {
            match self.inner.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.push_bytes(&buf[..n], &mut commands),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::UnexpectedEof
                            | ErrorKind::BrokenPipe
                            | ErrorKind::ConnectionReset
                    ) =>
                {
                    debug!("command channel closed");
                    self.closed = true;
                    if !self.pending.is_empty() && !self.discarding {
                        let line = std::mem::take(&mut self.pending);
                        self.finish_line(&line, &mut commands);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "command channel read failed");
                    break;
                }
            }
        }
        commands
    }

    /// True once the peer has closed the command channel.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn push_bytes(&mut self, bytes: &[u8], commands: &mut Vec<Command>) {
        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    let line = std::mem::take(&mut self.pending);
                    self.finish_line(&line, commands);
                }
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.pending.len() == MAX_LINE_LEN {
                warn!(max = MAX_LINE_LEN, "command line too long, discarding");
                self.pending.clear();
                self.discarding = true;
                continue;
            }
            self.pending.push(byte);
        }
    }

    fn finish_line(&self, line: &[u8], commands: &mut Vec<Command>) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\0']);
        if text.is_empty() {
            return;
        }
        match Command::parse(text) {
            Ok(command) => {
                debug!(%command, "command received");
                commands.push(command);
            }
            Err(err) => warn!(error = %err, "ignoring command"),
        }
    }
}

impl<R: Read> CommandSource for CommandReader<R> {
    fn poll_commands(&mut self) -> Vec<Command> {
        self.poll()
    }
}
