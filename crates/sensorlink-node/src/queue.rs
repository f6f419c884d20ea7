//! Bounded hand-off from an interrupt-style sample source to the producer.
//!
//! The source never waits: when the queue is full the newest sample is
//! dropped and counted, and the producer keeps draining at its own pace.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;

use tracing::trace;

use crate::sampler::Sample;

/// Queue depth used by the producer unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Create a bounded sample queue holding at most `capacity` samples.
///
/// # Panics
/// Panics if `capacity` is zero; a rendezvous queue would drop every offer.
pub fn sample_queue(capacity: usize) -> (SampleSender, SampleReceiver) {
    assert!(capacity > 0, "sample queue capacity must be non-zero");
    let (tx, rx) = mpsc::sync_channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        SampleSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        SampleReceiver { rx, dropped },
    )
}

/// Producing half. Cheap to clone for several sources.
#[derive(Clone)]
pub struct SampleSender {
    tx: mpsc::SyncSender<Sample>,
    dropped: Arc<AtomicU64>,
}

impl SampleSender {
    /// Offer a sample without blocking.
    ///
    /// Returns `false` when the sample was not queued, either because the
    /// queue is full (counted as a drop) or because the receiver is gone.
    pub fn offer(&self, sample: Sample) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(total, "sample queue full, dropping newest");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Samples dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consuming half, owned by the producer's sampler.
pub struct SampleReceiver {
    rx: mpsc::Receiver<Sample>,
    dropped: Arc<AtomicU64>,
}

impl SampleReceiver {
    /// Oldest queued sample, if any.
    pub fn try_recv(&self) -> Option<Sample> {
        self.rx.try_recv().ok()
    }

    /// Discard everything queued; returns how many samples were dropped.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Samples dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
