//! Base types and error handling.
//!
//! Foundational types shared by the pool, negotiator and facade:
//! - [`neterror::NetError`]: connection/protocol/pool error taxonomy
//! - [`endpoint::Endpoint`]: scheme + host + port identity
//! - [`context::ContextId`]: execution context identity for pool partitioning

pub mod context;
pub mod endpoint;
pub mod neterror;
