//! Protocol selection and session handler construction.
//!
//! A connection speaks either a single-stream protocol (HTTP/1.1, one
//! exchange at a time) or a multiplexed one (HTTP/2). The choice is made
//! once during connection setup, optionally deferred to the TLS layer's
//! ALPN answer, and is never revisited for the life of the session.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};

use crate::base::neterror::NetError;
use crate::socket::stream::{SessionId, Transport};

/// Preference among protocol modes, process-wide with per-call override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Always drive one request/response exchange at a time.
    ForceHttp1,
    /// Always drive the stream-multiplexing engine.
    ForceHttp2,
    /// Defer to ALPN when TLS is present; fall back to HTTP/1.1 otherwise.
    #[default]
    Negotiate,
}

/// Protocol mode fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatedProtocol {
    Http1,
    Http2,
}

/// Wire-format ALPN protocol list to offer for a version policy.
pub fn alpn_protos(policy: VersionPolicy) -> &'static [u8] {
    match policy {
        VersionPolicy::ForceHttp1 => b"\x08http/1.1",
        VersionPolicy::ForceHttp2 => b"\x02h2",
        VersionPolicy::Negotiate => b"\x02h2\x08http/1.1",
    }
}

/// Decide the protocol mode from the policy and the TLS layer's ALPN answer.
///
/// Forced modes ignore ALPN. `Negotiate` picks HTTP/2 only when the peer
/// agreed on `h2`; absence of TLS, no answer, or an unrecognized token all
/// fall back to the single-stream protocol.
pub fn resolve_protocol(policy: VersionPolicy, alpn: Option<&[u8]>) -> NegotiatedProtocol {
    match policy {
        VersionPolicy::ForceHttp1 => NegotiatedProtocol::Http1,
        VersionPolicy::ForceHttp2 => NegotiatedProtocol::Http2,
        VersionPolicy::Negotiate => match alpn {
            Some(proto) if proto == b"h2" => NegotiatedProtocol::Http2,
            _ => NegotiatedProtocol::Http1,
        },
    }
}

/// Driver half of a negotiated session: an HTTP/1.1 or HTTP/2 send handle.
pub(crate) enum RequestSender {
    H1(http1::SendRequest<Full<Bytes>>),
    H2(http2::SendRequest<Full<Bytes>>),
}

impl RequestSender {
    pub(crate) async fn send(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, NetError> {
        let result = match self {
            RequestSender::H1(sender) => sender.send_request(req).await,
            RequestSender::H2(sender) => sender.send_request(req).await,
        };
        result.map_err(from_hyper)
    }

    pub(crate) fn is_closed(&self) -> bool {
        match self {
            RequestSender::H1(sender) => sender.is_closed(),
            RequestSender::H2(sender) => sender.is_closed(),
        }
    }
}

impl std::fmt::Debug for RequestSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestSender::H1(_) => f.write_str("RequestSender::H1"),
            RequestSender::H2(_) => f.write_str("RequestSender::H2"),
        }
    }
}

/// Drive the protocol handshake over a connected transport and spawn the
/// connection driver. Failure here closes the connection; no session is
/// handed to the pool.
pub(crate) async fn handshake(
    transport: Transport,
    protocol: NegotiatedProtocol,
    id: SessionId,
) -> Result<RequestSender, NetError> {
    let io = TokioIo::new(transport);
    match protocol {
        NegotiatedProtocol::Http1 => {
            let (sender, conn) = http1::handshake::<_, Full<Bytes>>(io)
                .await
                .map_err(|e| NetError::ProtocolSetupFailed(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(session = id.as_u64(), error = %e, "h1 connection driver terminated");
                }
            });
            Ok(RequestSender::H1(sender))
        }
        NegotiatedProtocol::Http2 => {
            let (sender, conn) = http2::handshake::<_, _, Full<Bytes>>(TokioExecutor::new(), io)
                .await
                .map_err(|e| NetError::ProtocolSetupFailed(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(session = id.as_u64(), error = %e, "h2 connection driver terminated");
                }
            });
            Ok(RequestSender::H2(sender))
        }
    }
}

fn from_hyper(err: hyper::Error) -> NetError {
    if err.is_timeout() {
        NetError::ConnectionTimedOut
    } else if err.is_canceled() {
        NetError::ConnectionAborted
    } else if err.is_incomplete_message() {
        NetError::ConnectionClosed
    } else {
        NetError::ConnectionFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_modes_ignore_alpn() {
        assert_eq!(
            resolve_protocol(VersionPolicy::ForceHttp1, Some(&b"h2"[..])),
            NegotiatedProtocol::Http1
        );
        assert_eq!(resolve_protocol(VersionPolicy::ForceHttp2, None), NegotiatedProtocol::Http2);
    }

    #[test]
    fn negotiate_follows_alpn() {
        assert_eq!(
            resolve_protocol(VersionPolicy::Negotiate, Some(&b"h2"[..])),
            NegotiatedProtocol::Http2
        );
        assert_eq!(
            resolve_protocol(VersionPolicy::Negotiate, Some(&b"http/1.1"[..])),
            NegotiatedProtocol::Http1
        );
    }

    #[test]
    fn negotiate_falls_back_without_a_preference() {
        // No TLS, no ALPN answer, or an unknown token.
        assert_eq!(resolve_protocol(VersionPolicy::Negotiate, None), NegotiatedProtocol::Http1);
        assert_eq!(
            resolve_protocol(VersionPolicy::Negotiate, Some(&b"spdy/3"[..])),
            NegotiatedProtocol::Http1
        );
    }

    #[test]
    fn alpn_wire_lists() {
        assert_eq!(alpn_protos(VersionPolicy::Negotiate), b"\x02h2\x08http/1.1");
        assert_eq!(alpn_protos(VersionPolicy::ForceHttp2), b"\x02h2");
        assert_eq!(alpn_protos(VersionPolicy::ForceHttp1), b"\x08http/1.1");
    }
}
