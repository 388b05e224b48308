//! Chain integration module for the Solana cluster
//!
//! This module provides the connection collaborator the engine reads on-chain state and
//! submits transactions through, together with the types describing commitment levels,
//! transaction statuses and connection errors.

/// Connection trait and its JSON-RPC implementation
mod client;
/// Type definitions for connection data structures
mod types;

#[cfg(test)]
pub mod mock;

pub use client::{RpcConnection, SolanaRpcConnection};
pub use types::*;
