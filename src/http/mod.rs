//! HTTP protocol layer.
//!
//! - [`negotiator`]: single-stream vs multiplexed protocol selection
//! - [`session`]: the pooled, protocol-bound connection handle

pub mod negotiator;
pub mod session;
