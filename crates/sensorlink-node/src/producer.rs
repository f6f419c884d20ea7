use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sensorlink_frame::{encode, FrameWriter, FRAME_LEN};
use tracing::{debug, info, trace, warn};

use crate::command::{clamp_period, Command, CommandSource};
use crate::error::Result;
use crate::sampler::Sampler;

/// Encoded frames are staged in this many fixed slots, used round-robin.
pub const OUTPUT_SLOTS: usize = 8;

/// Producer behaviour configuration.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Period restored by START. Default: 1s.
    pub sample_period: Duration,
    /// Command poll interval while not sampling. Default: 100ms.
    pub idle_poll: Duration,
    /// Begin sampling without waiting for START. Default: false.
    pub autostart: bool,
    /// Stop `run` after this many send attempts.
    pub max_frames: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_secs(1),
            idle_poll: Duration::from_millis(100),
            autostart: false,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingState {
    /// Never started.
    Idle,
    On,
    Off,
}

/// What a single [`Producer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame with this sequence number went out.
    Sent { seq: u32 },
    /// Sampling is on but the sampler had nothing this tick.
    NoSample,
    /// Sampling is not on.
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub frames_sent: u64,
    /// Frames the channel refused; their sequence numbers are gaps downstream.
    pub frames_dropped: u64,
    pub empty_ticks: u64,
    pub commands_applied: u64,
}

/// The encoder task: samples, stamps, encodes and sends one frame per tick.
///
/// Sequence numbers advance for every sample taken, including samples whose
/// frame the channel refused, so a consumer sees the loss as a gap.
pub struct Producer<S, W> {
    sampler: S,
    writer: FrameWriter<W>,
    config: ProducerConfig,
    state: SamplingState,
    period: Duration,
    next_seq: u32,
    slot: usize,
    slots: [[u8; FRAME_LEN]; OUTPUT_SLOTS],
    generation: u64,
    stats: ProducerStats,
}

impl<S: Sampler, W: Write> Producer<S, W> {
    pub fn new(sampler: S, channel: W, config: ProducerConfig) -> Self {
        Self::with_writer(sampler, FrameWriter::new(channel), config)
    }

    pub fn with_writer(sampler: S, writer: FrameWriter<W>, config: ProducerConfig) -> Self {
        let mut producer = Self {
            sampler,
            writer,
            period: config.sample_period,
            config,
            state: SamplingState::Idle,
            next_seq: 0,
            slot: 0,
            slots: [[0u8; FRAME_LEN]; OUTPUT_SLOTS],
            generation: 0,
            stats: ProducerStats::default(),
        };
        if producer.config.autostart {
            producer.begin(true);
            info!("sampling started (autostart)");
        }
        producer
    }

    /// Apply one command from the consumer.
    pub fn apply(&mut self, command: Command) {
        self.stats.commands_applied += 1;
        match command {
            Command::Start if self.state == SamplingState::On => {
                info!("sampling already on, ignoring START");
            }
            Command::Start => {
                self.begin(true);
                info!(period = ?self.period, "sampling started");
            }
            Command::Stop => {
                self.sampler.stop();
                self.state = SamplingState::Off;
                info!("sampling stopped");
            }
            Command::Restart => {
                self.begin(false);
                info!(period = ?self.period, "sampling restarted");
            }
            Command::Debug => {
                info!(
                    state = ?self.state,
                    period = ?self.period,
                    next_seq = self.next_seq,
                    slot = self.slot,
                    frames_sent = self.stats.frames_sent,
                    frames_dropped = self.stats.frames_dropped,
                    "producer status"
                );
            }
            Command::SamplePeriod(secs) => {
                let secs = clamp_period(secs);
                self.period = Duration::from_secs(u64::from(secs));
                info!(secs, "sample period set");
            }
        }
    }

    /// Take one sample and send it, if sampling is on.
    ///
    /// A refused send is returned as an error after the sequence number and
    /// slot index have advanced; the sample is gone.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state != SamplingState::On {
            return Ok(TickOutcome::Inactive);
        }
        let Some(sample) = self.sampler.sample() else {
            self.stats.empty_ticks += 1;
            return Ok(TickOutcome::NoSample);
        };

        let seq = self.next_seq;
        let slot = self.slot;
        self.next_seq = seq.wrapping_add(1);
        self.slot = (slot + 1) % OUTPUT_SLOTS;

        self.slots[slot] = encode(&sample.into_record(seq));
        match self.writer.write_frame(&self.slots[slot]) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                trace!(seq, slot, "frame sent");
                Ok(TickOutcome::Sent { seq })
            }
            Err(err) => {
                self.stats.frames_dropped += 1;
                warn!(seq, error = %err, "frame dropped");
                Err(err.into())
            }
        }
    }

    /// Run until `stop` is set, the frame limit is reached or the channel
    /// closes. Commands are polled before every tick and every `idle_poll`
    /// while waiting.
    pub fn run<C>(&mut self, stop: &AtomicBool, commands: &mut C) -> Result<ProducerStats>
    where
        C: CommandSource + ?Sized,
    {
        debug!(state = ?self.state, period = ?self.period, "producer loop starting");
        while !stop.load(Ordering::Relaxed) {
            self.drain_commands(commands);
            if self.limit_reached() {
                break;
            }
            if self.state != SamplingState::On {
                std::thread::sleep(self.config.idle_poll);
                continue;
            }

            match self.tick() {
                Ok(_) => {}
                Err(err) if err.is_disconnect() => {
                    warn!(error = %err, "channel closed, producer stopping");
                    return Err(err);
                }
                Err(_) => {}
            }
            if self.limit_reached() {
                break;
            }
            self.wait_period(stop, commands);
        }
        info!(
            frames_sent = self.stats.frames_sent,
            frames_dropped = self.stats.frames_dropped,
            "producer finished"
        );
        Ok(self.stats)
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Index of the slot the next frame will be staged in.
    pub fn slot_index(&self) -> usize {
        self.slot
    }

    /// Frame most recently staged in slot `index`.
    ///
    /// # Panics
    /// Panics if `index >= OUTPUT_SLOTS`.
    pub fn output_slot(&self, index: usize) -> &[u8; FRAME_LEN] {
        &self.slots[index]
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn writer(&self) -> &FrameWriter<W> {
        &self.writer
    }

    pub fn into_writer(self) -> FrameWriter<W> {
        self.writer
    }

    fn begin(&mut self, reset_period: bool) {
        self.sampler.start();
        if reset_period {
            self.period = self.config.sample_period;
        }
        self.next_seq = 0;
        self.slot = 0;
        self.state = SamplingState::On;
        self.generation += 1;
    }

    fn drain_commands<C: CommandSource + ?Sized>(&mut self, commands: &mut C) {
        for command in commands.poll_commands() {
            self.apply(command);
        }
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_frames
            .is_some_and(|max| self.stats.frames_sent + self.stats.frames_dropped >= max)
    }

    /// Sleep out the current period in `idle_poll` slices. Ends early on
    /// stop, STOP, START or RESTART; a new period applies immediately.
    fn wait_period<C: CommandSource + ?Sized>(&mut self, stop: &AtomicBool, commands: &mut C) {
        let started = Instant::now();
        let generation = self.generation;
        loop {
            let elapsed = started.elapsed();
            if elapsed >= self.period || stop.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep((self.period - elapsed).min(self.config.idle_poll));
            self.drain_commands(commands);
            if self.state != SamplingState::On || self.generation != generation {
                return;
            }
        }
    }
}
