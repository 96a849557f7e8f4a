//! Socket and connection management.
//!
//! - [`pool`]: session pooling partitioned by execution context and endpoint
//! - [`connectjob`]: DNS -> TCP -> TLS -> protocol handshake flow
//! - [`stream`]: transport streams with data-ready observation
//! - [`timing`]: per-connection time-to-first-byte tracking
//! - [`tls`]: trust policy and TLS connector assembly

pub mod connectjob;
pub mod pool;
pub mod stream;
pub mod timing;
pub mod tls;
