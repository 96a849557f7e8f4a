//! A pooled connection bound to one endpoint and one execution context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;

use crate::base::context::ContextId;
use crate::base::endpoint::Endpoint;
use crate::base::neterror::NetError;
use crate::http::negotiator::{NegotiatedProtocol, RequestSender};
use crate::socket::stream::SessionId;

/// An open, possibly persistent connection to one endpoint.
///
/// Once leased, a session belongs to exactly one [`ContextId`] until it is
/// released back to the pool. The negotiated protocol mode is fixed at
/// connection setup and never changes.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    endpoint: Endpoint,
    context: ContextId,
    protocol: NegotiatedProtocol,
    sender: RequestSender,
    epoch: u64,
    pool_epoch: Arc<AtomicU64>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        endpoint: Endpoint,
        context: ContextId,
        protocol: NegotiatedProtocol,
        sender: RequestSender,
        epoch: u64,
        pool_epoch: Arc<AtomicU64>,
    ) -> Self {
        Self { id, endpoint, context, protocol, sender, epoch, pool_epoch }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The execution context this session is bound to.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Protocol mode negotiated at connection setup.
    pub fn protocol(&self) -> NegotiatedProtocol {
        self.protocol
    }

    /// Whether the underlying connection is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Whether the pool this session came from has been reset since the
    /// session was leased.
    pub fn is_stale(&self) -> bool {
        self.epoch != self.pool_epoch.load(Ordering::Acquire)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Issue a request on this session.
    ///
    /// Fails with [`NetError::StaleSession`] if the pool was reset since the
    /// lease, and [`NetError::SessionClosed`] if the connection is gone.
    pub async fn send_request(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, NetError> {
        if self.is_stale() {
            return Err(NetError::StaleSession);
        }
        if self.sender.is_closed() {
            return Err(NetError::SessionClosed);
        }
        self.sender.send(req).await
    }
}
