//! Per-connection time-to-first-byte tracking.
//!
//! The tracker observes raw connection lifecycle events (connected, TLS
//! handshake start, data ready) and derives the elapsed time from connection
//! readiness to the first application byte. Events for different sessions
//! arrive from different event-loop workers, so records live in a sharded
//! concurrent map keyed by [`SessionId`].

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::metrics::MetricsAccumulator;
use crate::socket::stream::SessionId;

/// Stopwatch state for one live session. At most one exists per session.
#[derive(Debug, Clone, Copy)]
struct TimingRecord {
    started_at: Instant,
    awaiting_tls: bool,
}

/// Observes session lifecycle events and reports one time-to-first-byte
/// sample per connect cycle to the accumulator.
///
/// Lifecycle-scoped: owned by the facade instance that created it, not
/// process-global, so independent facades never share timing state.
pub struct TimingTracker {
    records: DashMap<SessionId, TimingRecord>,
    accumulator: Arc<dyn MetricsAccumulator>,
}

impl TimingTracker {
    pub fn new(accumulator: Arc<dyn MetricsAccumulator>) -> Self {
        Self { records: DashMap::new(), accumulator }
    }

    /// Connection became ready (TCP established, or re-registered after a
    /// completed TLS handshake).
    pub fn connected(&self, id: SessionId) {
        self.connected_at(id, Instant::now());
    }

    /// TLS handshake is starting on the connection.
    pub fn tls_started(&self, id: SessionId) {
        self.tls_started_at(id, Instant::now());
    }

    /// Data became readable on the connection. Returns whether the session
    /// still has a timing record (callers may stop reporting once it is gone).
    pub fn data_ready(&self, id: SessionId) -> bool {
        self.data_ready_at(id, Instant::now())
    }

    /// [`TimingTracker::connected`] with an explicit event time.
    pub fn connected_at(&self, id: SessionId, at: Instant) {
        match self.records.entry(id) {
            // Post-handshake readiness: keep the handshake-start stopwatch,
            // clear the flag so the next data-ready event completes the record.
            Entry::Occupied(mut entry) => entry.get_mut().awaiting_tls = false,
            Entry::Vacant(entry) => {
                entry.insert(TimingRecord { started_at: at, awaiting_tls: false });
            }
        }
    }

    /// [`TimingTracker::tls_started`] with an explicit event time.
    ///
    /// Restarts the stopwatch: time-to-first-byte measures from the
    /// handshake onward, not from the raw socket connect.
    pub fn tls_started_at(&self, id: SessionId, at: Instant) {
        self.records.insert(id, TimingRecord { started_at: at, awaiting_tls: true });
    }

    /// [`TimingTracker::data_ready`] with an explicit event time.
    ///
    /// Handshake traffic (record still flagged as TLS) is not a measurement.
    /// The first data-ready event with the flag clear is terminal: the sample
    /// is forwarded to the accumulator and the record removed. Events for
    /// unknown or already-completed sessions are ignored; keep-alive
    /// responses after the first are expected to land here.
    pub fn data_ready_at(&self, id: SessionId, at: Instant) -> bool {
        match self.records.entry(id) {
            Entry::Occupied(entry) => {
                if entry.get().awaiting_tls {
                    return true;
                }
                let record = entry.remove();
                let elapsed = at.saturating_duration_since(record.started_at);
                tracing::debug!(
                    session = id.as_u64(),
                    ttfb_millis = elapsed.as_millis() as u64,
                    "time to first byte"
                );
                self.accumulator.accumulate(elapsed);
                false
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Drop the record for a session without producing a sample
    /// (teardown, connect failure, timeout).
    pub fn discard(&self, id: SessionId) {
        self.records.remove(&id);
    }

    /// Whether a session currently has a timing record.
    pub fn is_tracked(&self, id: SessionId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of live timing records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl std::fmt::Debug for TimingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingTracker").field("records", &self.records.len()).finish()
    }
}
