//! The public entry point wiring pool, negotiator, trust policy and timing
//! into a running event loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::base::context::ContextId;
use crate::base::endpoint::Endpoint;
use crate::base::neterror::NetError;
use crate::http::negotiator::VersionPolicy;
use crate::http::session::Session;
use crate::metrics::{MetricsAccumulator, NullAccumulator};
use crate::socket::connectjob::{ConnectOptions, Connector};
use crate::socket::pool::{PoolConfig, SessionPool};
use crate::socket::timing::TimingTracker;
use crate::socket::tls::TrustPolicy;

/// One event-loop worker per ~100 expected concurrent callers, minimum one.
fn io_threads_for(expected_concurrency: usize) -> usize {
    expected_concurrency / 100 + 1
}

/// Builder for a [`Requester`].
pub struct RequesterBuilder {
    expected_concurrency: usize,
    socket_timeout: Duration,
    trust_policy: TrustPolicy,
    version_policy: VersionPolicy,
    pool: PoolConfig,
    accumulator: Arc<dyn MetricsAccumulator>,
}

impl Default for RequesterBuilder {
    fn default() -> Self {
        Self {
            expected_concurrency: 1,
            socket_timeout: Duration::from_secs(30),
            trust_policy: TrustPolicy::default(),
            version_policy: VersionPolicy::default(),
            pool: PoolConfig::default(),
            accumulator: Arc::new(NullAccumulator),
        }
    }
}

impl RequesterBuilder {
    /// Expected total number of concurrent callers; sizes the event loop.
    pub fn expected_concurrency(mut self, concurrency: usize) -> Self {
        self.expected_concurrency = concurrency;
        self
    }

    /// Socket timeout applied to connects (and overridable per call).
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Certificate-validation strategy for TLS endpoints.
    pub fn trust_policy(mut self, trust: TrustPolicy) -> Self {
        self.trust_policy = trust;
        self
    }

    /// Default protocol version policy for new sessions.
    pub fn version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    /// Idle-eviction policy for the session pool.
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool = config;
        self
    }

    /// Sink receiving one time-to-first-byte sample per connect cycle.
    pub fn accumulator(mut self, accumulator: Arc<dyn MetricsAccumulator>) -> Self {
        self.accumulator = accumulator;
        self
    }

    /// Start the event loop and assemble the requester.
    ///
    /// Fails fatally if the reactor cannot be built; no half-started
    /// facade is ever returned.
    pub fn build(self) -> Result<Requester, NetError> {
        let io_threads = io_threads_for(self.expected_concurrency);
        let reactor = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(io_threads)
            .thread_name("loadnet-io")
            .enable_all()
            .build()
            .map_err(|e| NetError::InitFailed(e.to_string()))?;

        let tracker = Arc::new(TimingTracker::new(self.accumulator));
        let connector = Arc::new(Connector::new(
            self.trust_policy,
            self.version_policy,
            self.socket_timeout,
            Arc::clone(&tracker),
        ));
        let pool = Arc::new(SessionPool::new(connector, reactor.handle().clone(), self.pool));
        pool.start_cleanup_task();

        tracing::debug!(io_threads, "requester started");

        Ok(Requester { reactor: Some(reactor), pool, io_threads })
    }
}

/// Asynchronous HTTP requester for load generation.
///
/// Construct once per test run via [`Requester::builder`]. `connect` leases
/// sessions from the caller's context partition; `reset` drops all pooled
/// state between test phases.
pub struct Requester {
    reactor: Option<Runtime>,
    pool: Arc<SessionPool>,
    io_threads: usize,
}

impl Requester {
    pub fn builder() -> RequesterBuilder {
        RequesterBuilder::default()
    }

    /// Lease a session to `endpoint` for the calling thread's context.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<Session, NetError> {
        self.connect_with(endpoint, ConnectOptions::default()).await
    }

    /// [`Requester::connect`] with per-call timeout/version-policy overrides.
    pub async fn connect_with(
        &self,
        endpoint: &Endpoint,
        options: ConnectOptions,
    ) -> Result<Session, NetError> {
        self.connect_from(ContextId::current(), endpoint, options).await
    }

    /// Lease a session for an explicit execution context.
    ///
    /// Tasks that migrate between threads should pin their identity this
    /// way rather than relying on [`ContextId::current`].
    pub async fn connect_from(
        &self,
        context: ContextId,
        endpoint: &Endpoint,
        options: ConnectOptions,
    ) -> Result<Session, NetError> {
        self.pool.lease(endpoint, context, options).await
    }

    /// Return a session to its pool partition.
    pub fn release(&self, session: Session) {
        self.pool.release(session);
    }

    /// Drop all pooled sessions and in-flight partition state.
    ///
    /// Outstanding leases become stale and fail on next use.
    pub fn reset(&self) {
        self.pool.clear();
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Timing state for live connects; mainly useful for introspection.
    pub fn timing(&self) -> &TimingTracker {
        self.pool.connector().tracker()
    }

    /// Number of event-loop worker threads backing this requester.
    pub fn io_thread_count(&self) -> usize {
        self.io_threads
    }
}

impl Drop for Requester {
    fn drop(&mut self) {
        // The facade may be dropped from an async context, where a blocking
        // runtime shutdown would panic.
        if let Some(reactor) = self.reactor.take() {
            reactor.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("io_threads", &self.io_threads)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reactor_sizing_formula() {
        assert_eq!(io_threads_for(0), 1);
        assert_eq!(io_threads_for(1), 1);
        assert_eq!(io_threads_for(99), 1);
        assert_eq!(io_threads_for(100), 2);
        assert_eq!(io_threads_for(250), 3);
    }
}
