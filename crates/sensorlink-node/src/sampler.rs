use sensorlink_frame::Record;
use tracing::debug;

use crate::queue::SampleReceiver;

/// One reading, before the producer stamps it with a sequence number.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub temperature: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

impl Sample {
    pub fn new(temperature: f32, gyro_x: f32, gyro_y: f32, gyro_z: f32) -> Self {
        Self {
            temperature,
            gyro_x,
            gyro_y,
            gyro_z,
        }
    }

    pub fn into_record(self, seq: u32) -> Record {
        Record::new(seq, self.temperature, self.gyro_x, self.gyro_y, self.gyro_z)
    }
}

// Bit-exact, like `Record`.
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.into_record(0) == other.into_record(0)
    }
}

/// Source of readings for the producer.
pub trait Sampler {
    /// (Re)initialise the source. Called on START and RESTART.
    fn start(&mut self);

    /// Power the source down. Called on STOP.
    fn stop(&mut self);

    /// Latest reading, or `None` if nothing is available this tick.
    fn sample(&mut self) -> Option<Sample>;
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn sample(&mut self) -> Option<Sample> {
        (**self).sample()
    }
}

/// Deterministic stand-in for a real sensor.
///
/// Produces a slow waveform around 20.0 °C and 1.0/2.0/3.0 °/s, so a
/// consumer can tell consecutive frames apart and spot gaps by eye.
#[derive(Debug, Clone)]
pub struct SyntheticSampler {
    base: Sample,
    step: u32,
    running: bool,
}

impl SyntheticSampler {
    pub fn new() -> Self {
        Self::with_base(Sample::new(20.0, 1.0, 2.0, 3.0))
    }

    pub fn with_base(base: Sample) -> Self {
        Self {
            base,
            step: 0,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for SyntheticSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SyntheticSampler {
    fn start(&mut self) {
        self.step = 0;
        self.running = true;
        debug!("synthetic sampler started");
    }

    fn stop(&mut self) {
        self.running = false;
        debug!("synthetic sampler stopped");
    }

    fn sample(&mut self) -> Option<Sample> {
        if !self.running {
            return None;
        }
        let phase = self.step as f32 * 0.1;
        self.step = self.step.wrapping_add(1);
        Some(Sample::new(
            self.base.temperature + 0.5 * phase.sin(),
            self.base.gyro_x + 0.25 * phase.cos(),
            self.base.gyro_y - 0.25 * phase.sin(),
            self.base.gyro_z + 0.1 * (2.0 * phase).sin(),
        ))
    }
}

/// Sampler fed by an interrupt-style source through a bounded queue.
///
/// Each tick takes at most one queued sample, oldest first.
pub struct QueuedSampler {
    rx: SampleReceiver,
    running: bool,
}

impl QueuedSampler {
    pub fn new(rx: SampleReceiver) -> Self {
        Self { rx, running: false }
    }

    /// Samples the source dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.rx.dropped()
    }
}

impl Sampler for QueuedSampler {
    fn start(&mut self) {
        let stale = self.rx.drain();
        if stale > 0 {
            debug!(stale, "discarded samples queued before start");
        }
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn sample(&mut self) -> Option<Sample> {
        if !self.running {
            return None;
        }
        self.rx.try_recv()
    }
}
