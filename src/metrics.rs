//! Outbound metrics interface.
//!
//! The engine reports one time-to-first-byte sample per completed connect
//! cycle through [`MetricsAccumulator`]. Implementations are called from
//! event-loop workers and must not block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for time-to-first-byte samples.
pub trait MetricsAccumulator: Send + Sync + 'static {
    /// Record one sample. Fire-and-forget; must not block the caller.
    fn accumulate(&self, time_to_first_byte: Duration);
}

/// Lock-free aggregate of time-to-first-byte samples.
///
/// Keeps a running count and total so a statistics layer can read the mean
/// between test phases and start over.
#[derive(Debug, Default)]
pub struct TtfbRecorder {
    count: AtomicU64,
    total_micros: AtomicU64,
}

impl TtfbRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples recorded so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean of all samples, or `None` if nothing was recorded.
    pub fn average(&self) -> Option<Duration> {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        let total = self.total_micros.load(Ordering::Relaxed);
        Some(Duration::from_micros(total / count))
    }

    /// Read the mean and reset the aggregate for the next phase.
    pub fn take(&self) -> Option<Duration> {
        let average = self.average();
        self.count.store(0, Ordering::Relaxed);
        self.total_micros.store(0, Ordering::Relaxed);
        average
    }
}

impl MetricsAccumulator for TtfbRecorder {
    fn accumulate(&self, time_to_first_byte: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_micros
            .fetch_add(time_to_first_byte.as_micros() as u64, Ordering::Relaxed);
    }
}

/// Discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAccumulator;

impl MetricsAccumulator for NullAccumulator {
    fn accumulate(&self, _time_to_first_byte: Duration) {}
}
