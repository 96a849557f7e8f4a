use std::io;

use thiserror::Error;

/// Error taxonomy for connection establishment, protocol setup and pooling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    // Connection errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved: {0}")]
    NameNotResolved(String),
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // Protocol setup errors
    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),
    #[error("ALPN negotiation failed")]
    AlpnNegotiationFailed,
    #[error("Protocol setup failed: {0}")]
    ProtocolSetupFailed(String),

    // Pool errors
    #[error("Session is stale (pool was reset)")]
    StaleSession,
    #[error("Session is closed")]
    SessionClosed,

    // Endpoint errors
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    // Construction errors
    #[error("Engine initialization failed: {0}")]
    InitFailed(String),
}

impl NetError {
    /// Whether this error is the distinguished timeout kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::ConnectionTimedOut)
    }

    /// Map an IO error from a connect attempt onto the connect taxonomy.
    pub(crate) fn from_connect_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            _ => NetError::ConnectionFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_distinguished() {
        assert!(NetError::ConnectionTimedOut.is_timeout());
        assert!(!NetError::ConnectionRefused.is_timeout());
        assert!(!NetError::StaleSession.is_timeout());
    }

    #[test]
    fn io_error_mapping() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(NetError::from_connect_io(&refused), NetError::ConnectionRefused);

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert!(NetError::from_connect_io(&timed_out).is_timeout());

        let other = io::Error::new(io::ErrorKind::Other, "weird");
        assert_eq!(NetError::from_connect_io(&other), NetError::ConnectionFailed);
    }
}
