//! Thread-partitioned session pool.
//!
//! Partitions are keyed by `(ContextId, Endpoint)`: each execution context
//! gets its own private sub-pool per endpoint. Concurrent callers on
//! different contexts never contend on the same partition and are never
//! handed the same underlying connection, while a single context still gets
//! keep-alive reuse across its own requests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::runtime::Handle;

use crate::base::context::ContextId;
use crate::base::endpoint::Endpoint;
use crate::base::neterror::NetError;
use crate::http::session::Session;
use crate::socket::connectjob::{ConnectOptions, Connector};

/// Idle-eviction policy. The partition granularity is fixed; eviction
/// timing is configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// How long a released session may sit idle before eviction.
    pub idle_timeout: Duration,
    /// How often the background sweep runs.
    pub cleanup_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// One pool partition key: the caller's identity plus the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PartitionKey {
    context: ContextId,
    endpoint: Endpoint,
}

/// Idle session with metadata for timeout tracking.
struct IdleSession {
    session: Session,
    idle_since: Instant,
}

#[derive(Default)]
struct Partition {
    idle: VecDeque<IdleSession>,
}

/// Leases and returns reusable sessions, partitioned by execution context
/// and endpoint.
///
/// Owned by a facade instance; `clear()` is an explicit lifecycle operation,
/// so multiple independent facades in one process never share pool state.
pub struct SessionPool {
    partitions: DashMap<PartitionKey, Partition>,
    /// Bumped by `clear()`; sessions carry the epoch they were created
    /// under and become stale once it moves on.
    epoch: Arc<AtomicU64>,
    connector: Arc<Connector>,
    reactor: Handle,
    config: PoolConfig,
}

impl SessionPool {
    pub(crate) fn new(connector: Arc<Connector>, reactor: Handle, config: PoolConfig) -> Self {
        Self {
            partitions: DashMap::new(),
            epoch: Arc::new(AtomicU64::new(0)),
            connector,
            reactor,
            config,
        }
    }

    /// Lease a session for `(endpoint, context)`.
    ///
    /// Returns an idle session already bound to the pair when one is alive;
    /// otherwise establishes a new one on the reactor. Sessions leased to
    /// different contexts are always disjoint.
    pub async fn lease(
        &self,
        endpoint: &Endpoint,
        context: ContextId,
        options: ConnectOptions,
    ) -> Result<Session, NetError> {
        let key = PartitionKey { context, endpoint: endpoint.clone() };

        if let Some(session) = self.checkout_idle(&key) {
            tracing::debug!(
                endpoint = %endpoint,
                context = context.as_u64(),
                session = session.id().as_u64(),
                "reusing pooled session"
            );
            return Ok(session);
        }

        // Miss: establish on the reactor, the caller only awaits the result.
        let connector = Arc::clone(&self.connector);
        let endpoint = endpoint.clone();
        let epoch = self.epoch.load(Ordering::Acquire);
        let pool_epoch = Arc::clone(&self.epoch);
        let job = self.reactor.spawn(async move {
            connector.establish(&endpoint, context, &options, epoch, pool_epoch).await
        });
        job.await.map_err(|_| NetError::ConnectionAborted)?
    }

    /// Pop an idle session from the partition, skipping dead or stale ones.
    fn checkout_idle(&self, key: &PartitionKey) -> Option<Session> {
        let mut partition = self.partitions.get_mut(key)?;
        let current = self.epoch.load(Ordering::Acquire);
        while let Some(idle) = partition.idle.pop_front() {
            if idle.session.epoch() == current && idle.session.is_connected() {
                return Some(idle.session);
            }
            // Dead or stale session, drop and try the next.
        }
        None
    }

    /// Return a session to its context-local idle set.
    ///
    /// Stale (post-reset) and dead sessions are dropped instead; dropping
    /// closes the underlying connection.
    pub fn release(&self, session: Session) {
        if session.is_stale() || !session.is_connected() {
            tracing::debug!(session = session.id().as_u64(), "dropping session on release");
            return;
        }
        let key = PartitionKey {
            context: session.context(),
            endpoint: session.endpoint().clone(),
        };
        self.partitions
            .entry(key)
            .or_default()
            .idle
            .push_back(IdleSession { session, idle_since: Instant::now() });
    }

    /// Forcibly close every pooled session and empty the pool.
    ///
    /// Safe to call while leases are outstanding: those sessions become
    /// stale and fail on next use.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.partitions.clear();
        tracing::debug!("session pool cleared");
    }

    /// Evict idle sessions past the idle timeout and drop empty partitions.
    pub fn cleanup_idle_sessions(&self) {
        let now = Instant::now();
        let mut empty_keys = Vec::new();

        for mut entry in self.partitions.iter_mut() {
            let partition = entry.value_mut();
            partition.idle.retain(|idle| {
                now.duration_since(idle.idle_since) < self.config.idle_timeout
                    && idle.session.is_connected()
            });
            if partition.idle.is_empty() {
                empty_keys.push(entry.key().clone());
            }
        }

        for key in empty_keys {
            self.partitions.remove_if(&key, |_, partition| partition.idle.is_empty());
        }
    }

    /// Start the periodic idle sweep on the reactor.
    pub(crate) fn start_cleanup_task(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        let interval = self.config.cleanup_interval;
        self.reactor.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                pool.cleanup_idle_sessions();
            }
        });
    }

    /// Current pool epoch; advances on every `clear()`.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Total idle sessions across all partitions.
    pub fn idle_count(&self) -> usize {
        self.partitions.iter().map(|p| p.idle.len()).sum()
    }

    /// Number of live partitions.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub(crate) fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("partitions", &self.partitions.len())
            .field("idle", &self.idle_count())
            .field("epoch", &self.epoch())
            .finish()
    }
}
