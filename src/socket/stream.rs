//! Transport streams and read observation.
//!
//! [`Transport`] is the connected socket handed to the protocol layer, plain
//! TCP or TLS. Both variants sit on top of a [`MeteredStream`], which reports
//! readable data to the [`TimingTracker`]; placing the meter below TLS means
//! handshake traffic is observed exactly like the reactor's raw readiness
//! events, and the tracker's awaiting-TLS flag decides what counts.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::socket::timing::TimingTracker;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of one established transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next session id.
    pub fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// An `AsyncRead + AsyncWrite` wrapper reporting data-ready events.
///
/// Every successful read that produces bytes is reported to the tracker
/// until the tracker signals the session's timing record is gone.
#[derive(Debug)]
pub struct MeteredStream<S> {
    inner: S,
    id: SessionId,
    tracker: Arc<TimingTracker>,
    observing: bool,
}

impl<S> MeteredStream<S> {
    pub fn new(inner: S, id: SessionId, tracker: Arc<TimingTracker>) -> Self {
        Self { inner, id, tracker, observing: true }
    }

    pub fn session_id(&self) -> SessionId {
        self.id
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MeteredStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            if this.observing && buf.filled().len() > before {
                this.observing = this.tracker.data_ready(this.id);
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// A connected transport (TCP or TLS).
#[derive(Debug)]
pub enum Transport {
    Tcp(MeteredStream<TcpStream>),
    Tls(SslStream<MeteredStream<TcpStream>>),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// The ALPN protocol the TLS layer selected, if any.
    pub fn negotiated_alpn(&self) -> Option<Vec<u8>> {
        match self {
            Transport::Tcp(_) => None,
            Transport::Tls(s) => s.ssl().selected_alpn_protocol().map(|p| p.to_vec()),
        }
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
