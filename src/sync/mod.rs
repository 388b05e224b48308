//! Sale synchronization module
//!
//! Keeps one process-wide `SaleSnapshot` current and publishes it to observers. The sync
//! loop owns the snapshot; callers reach it through a `SyncHandle`.

/// Event types and dispatch to observers
pub mod events;
/// Refresh statistics
pub mod progress_tracker;
/// The loop and its handle
pub mod service;
pub mod types;

pub use events::{EventDispatcher, SaleEvent, SaleEventHandler, ViewLogger};
pub use progress_tracker::{RefreshStats, RefreshTracker};
pub use service::{DEFAULT_REFRESH_INTERVAL, SyncHandle, SyncLoop};
pub use types::*;
