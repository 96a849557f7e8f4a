//! Connection establishment: DNS -> TCP -> TLS -> protocol handshake.
//!
//! The whole job runs under the socket timeout and reports lifecycle events
//! to the [`TimingTracker`] as it goes. On failure or timeout the timing
//! record is discarded without producing a sample and no session exists.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::base::context::ContextId;
use crate::base::endpoint::Endpoint;
use crate::base::neterror::NetError;
use crate::http::negotiator::{self, VersionPolicy};
use crate::http::session::Session;
use crate::socket::stream::{MeteredStream, SessionId, Transport};
use crate::socket::timing::TimingTracker;
use crate::socket::tls::{self, TrustPolicy};

/// Per-call overrides for a connect attempt. `None` fields fall back to the
/// facade configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    pub timeout: Option<Duration>,
    pub version_policy: Option<VersionPolicy>,
}

/// Establishes sessions on behalf of the pool.
///
/// Read-only after construction; shared freely between event-loop workers.
#[derive(Debug)]
pub(crate) struct Connector {
    trust: TrustPolicy,
    default_policy: VersionPolicy,
    socket_timeout: Duration,
    tracker: Arc<TimingTracker>,
}

impl Connector {
    pub(crate) fn new(
        trust: TrustPolicy,
        default_policy: VersionPolicy,
        socket_timeout: Duration,
        tracker: Arc<TimingTracker>,
    ) -> Self {
        Self { trust, default_policy, socket_timeout, tracker }
    }

    pub(crate) fn tracker(&self) -> &Arc<TimingTracker> {
        &self.tracker
    }

    /// Establish a new session for `(endpoint, context)`.
    pub(crate) async fn establish(
        &self,
        endpoint: &Endpoint,
        context: ContextId,
        options: &ConnectOptions,
        epoch: u64,
        pool_epoch: Arc<AtomicU64>,
    ) -> Result<Session, NetError> {
        let policy = options.version_policy.unwrap_or(self.default_policy);
        let timeout = options.timeout.unwrap_or(self.socket_timeout);
        let id = SessionId::next();

        let job = self.run(endpoint, context, policy, id, epoch, pool_epoch);
        match tokio::time::timeout(timeout, job).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => {
                self.tracker.discard(id);
                Err(e)
            }
            Err(_) => {
                self.tracker.discard(id);
                tracing::debug!(endpoint = %endpoint, timeout_millis = timeout.as_millis() as u64, "connect timed out");
                Err(NetError::ConnectionTimedOut)
            }
        }
    }

    async fn run(
        &self,
        endpoint: &Endpoint,
        context: ContextId,
        policy: VersionPolicy,
        id: SessionId,
        epoch: u64,
        pool_epoch: Arc<AtomicU64>,
    ) -> Result<Session, NetError> {
        // 1. DNS resolution
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(endpoint.authority())
            .await
            .map_err(|_| NetError::NameNotResolved(endpoint.host().to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::NameNotResolved(endpoint.host().to_string()));
        }

        // 2. TCP connect, first address that answers
        let mut stream = None;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                let err = last_err
                    .as_ref()
                    .map(NetError::from_connect_io)
                    .unwrap_or(NetError::ConnectionFailed);
                return Err(err);
            }
        };

        self.tracker.connected(id);
        let metered = MeteredStream::new(stream, id, Arc::clone(&self.tracker));

        // 3. TLS handshake (if https), below which the meter keeps observing
        let transport = if endpoint.is_tls() {
            self.tracker.tls_started(id);

            let connector = tls::build_connector(self.trust, Some(negotiator::alpn_protos(policy)))?;
            let mut config = connector
                .configure()
                .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
            if !self.trust.verify_hostname() {
                config.set_verify_hostname(false);
            }

            let tls_stream = tokio_boring::connect(config, endpoint.host(), metered)
                .await
                .map_err(|e| NetError::TlsHandshakeFailed(format!("{e:?}")))?;

            // Handshake finished: clear the awaiting-TLS flag, keep the
            // handshake-start stopwatch running.
            self.tracker.connected(id);
            Transport::Tls(tls_stream)
        } else {
            Transport::Tcp(metered)
        };

        // 4. Protocol selection, fixed for the session's lifetime
        let protocol = negotiator::resolve_protocol(policy, transport.negotiated_alpn().as_deref());
        tracing::debug!(
            endpoint = %endpoint,
            session = id.as_u64(),
            protocol = ?protocol,
            "session established"
        );

        let sender = negotiator::handshake(transport, protocol, id).await?;
        Ok(Session::new(id, endpoint.clone(), context, protocol, sender, epoch, pool_epoch))
    }
}
