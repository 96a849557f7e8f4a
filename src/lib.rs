//! # loadnet
//!
//! The network-facing core of a load-testing engine: an asynchronous HTTP
//! client used by many concurrent virtual-user contexts to issue large
//! volumes of requests while reusing persistent connections and recording
//! per-connection timing.
//!
//! ## Features
//!
//! - **Thread-partitioned pooling**: each execution context gets private
//!   sub-pools per endpoint, so concurrent callers never share a socket
//! - **HTTP/1.1 & HTTP/2**: per-connection protocol selection, forced or
//!   negotiated via ALPN
//! - **Time-to-first-byte tracking**: connect-to-first-byte latency per
//!   connection, excluding TLS handshake time
//! - **Trust policies**: trust-all for self-signed test targets (default)
//!   or strict chain validation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use loadnet::base::endpoint::Endpoint;
//! use loadnet::requester::Requester;
//!
//! let requester = Requester::builder()
//!     .expected_concurrency(500)
//!     .socket_timeout(std::time::Duration::from_secs(10))
//!     .build()?;
//!
//! let endpoint = Endpoint::parse("https://target.test:8443")?;
//! let mut session = requester.connect(&endpoint).await?;
//! let response = session.send_request(request).await?;
//! requester.release(session);
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Endpoint, context identity and error definitions
//! - [`http`] - Protocol negotiation and the session handle
//! - [`metrics`] - Outbound time-to-first-byte accumulator interface
//! - [`requester`] - The facade owning the event loop and the pool
//! - [`socket`] - Session pool, connect flow, transports, timing, TLS

pub mod base;
pub mod http;
pub mod metrics;
pub mod requester;
pub mod socket;
