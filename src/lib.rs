//! Sale state synchronization and mint orchestration for candy machine sales.
//!
//! The crate keeps a consistent view of an on-chain sale, decides whether a wallet may
//! mint, and drives the setup and mint transactions through to a classified outcome.

pub mod chain;
pub mod config;
pub mod gate;
pub mod mint;
pub mod quota;
pub mod sale;
pub mod sync;
pub mod transaction;
pub mod utils;
