//! Producer and consumer runtimes around the sensorlink frame protocol.
//!
//! The producer side turns samples into frames on a fixed period and obeys
//! text commands from its peer. The consumer side drives a channel into the
//! deframer and forwards every validated record to a downstream sink.

pub mod command;
pub mod error;
pub mod ingest;
pub mod producer;
pub mod queue;
pub mod sampler;
pub mod sink;

pub use command::{send_command, Command, CommandReader, CommandSource, MAX_SAMPLE_PERIOD_SECS};
pub use error::{CommandError, NodeError, Result};
pub use ingest::{IngestConfig, IngestContext, IngestStats, PollStatus};
pub use producer::{
    Producer, ProducerConfig, ProducerStats, SamplingState, TickOutcome, OUTPUT_SLOTS,
};
pub use queue::{sample_queue, SampleReceiver, SampleSender, DEFAULT_QUEUE_CAPACITY};
pub use sampler::{QueuedSampler, Sample, Sampler, SyntheticSampler};
pub use sink::{FnSink, JsonLinesSink, RecordSink, SensorData};
