use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use sensorlink_frame::DEFAULT_RING_CAPACITY;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod decode;
pub mod encode;
pub mod ingest;
pub mod produce;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the producer: sample on a fixed period and emit one frame per tick.
    Produce(ProduceArgs),
    /// Run the consumer: deframe a channel and print every validated record.
    Ingest(IngestArgs),
    /// Deframe a captured byte stream offline.
    Decode(DecodeArgs),
    /// Encode one record and print the frame bytes.
    Encode(EncodeArgs),
    /// Write one command line to a producer's command channel.
    #[command(name = "command")]
    Control(ControlArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Produce(args) => produce::run(args, format),
        Command::Ingest(args) => ingest::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Control(args) => control::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ProduceArgs {
    /// Device path to write frames to, or socket path to bind with --uds.
    pub path: PathBuf,
    /// Bind a Unix domain socket at PATH and serve one consumer.
    #[arg(long)]
    pub uds: bool,
    /// Sample period until a SAMPERIOD command changes it (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s", env = "SENSORLINK_PERIOD")]
    pub period: String,
    /// Stop after N frames (sent or dropped).
    #[arg(long)]
    pub count: Option<u64>,
    /// Start sampling without waiting for START.
    #[arg(long)]
    pub autostart: bool,
    /// Separate device to read commands from. Default: the frame channel.
    #[arg(long, value_name = "PATH", conflicts_with = "uds")]
    pub commands: Option<PathBuf>,
    /// How often commands are polled while idle or waiting.
    #[arg(long, default_value = "100ms")]
    pub idle_poll: String,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Device path to read frames from, or socket path to connect to with --uds.
    pub path: PathBuf,
    /// Connect to a Unix domain socket at PATH.
    #[arg(long)]
    pub uds: bool,
    /// Exit after N records.
    #[arg(long)]
    pub count: Option<u64>,
    /// Ring buffer capacity in bytes (at least one frame).
    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY, env = "SENSORLINK_RING_CAPACITY")]
    pub ring_capacity: usize,
    /// Largest single channel read in bytes. Default: the ring capacity.
    #[arg(long)]
    pub read_chunk: Option<usize>,
    /// Sleep between polls when the channel is idle (e.g. 100ms).
    #[arg(long, default_value = "100ms", env = "SENSORLINK_POLL_INTERVAL")]
    pub poll_interval: String,
    /// Command to send to the producer before reading (repeatable, e.g. --send START).
    #[arg(long = "send", value_name = "COMMAND")]
    pub send: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured byte stream.
    pub file: PathBuf,
    /// Feed the deframer this many bytes at a time.
    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY)]
    pub chunk: usize,
    /// Ring buffer capacity in bytes (at least one frame).
    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY)]
    pub ring_capacity: usize,
    /// The file holds hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Exit with a data error if any bytes were discarded.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Sequence number.
    #[arg(long, default_value_t = 0)]
    pub seq: u32,
    /// Temperature reading.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub temperature: f32,
    /// Gyroscope axes as x,y,z. Default: 0,0,0.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub gyro: Vec<f32>,
}

#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Command device path, or socket path with --uds.
    pub path: PathBuf,
    /// Command text: START, STOP, RESTART, DEBUG or SAMPERIOD:<seconds>.
    pub text: String,
    /// Connect to a Unix domain socket at PATH.
    #[arg(long)]
    pub uds: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
