//!
//! Utility module for the mint engine.
//!
//! Re-exports formatting helpers and explorer links for use throughout the codebase.
/// Cluster names and explorer links
pub mod explorer;
/// Utility functions for formatting and display
pub mod format;

pub use explorer::{Cluster, explorer_token_url};
pub use format::format_token_amount;

/// Number of decimal places of the native SOL unit.
pub const NATIVE_DECIMALS: u32 = 9;
