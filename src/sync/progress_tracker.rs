//! Refresh statistics for the sync loop.
//!
//! `RefreshTracker` counts completed and failed refreshes per consistency level, notices
//! when the remaining supply moves, and periodically logs a summary line.

use crate::chain::Commitment;
use crate::sale::SaleView;

use std::collections::BTreeMap;
use tracing::{info, warn};

/// Successes and failures at one consistency level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCounts {
	pub succeeded: usize,
	pub failed: usize,
}

/// Tracks the outcome of every refresh the loop performs
#[derive(Debug, Clone)]
pub struct RefreshTracker {
	levels: BTreeMap<Commitment, LevelCounts>,
	optimistic_applied: usize,
	/// Failures since the last successful refresh
	consecutive_failures: usize,
	last_items_remaining: Option<u64>,
	/// Refreshes since the last summary line
	since_last_log: usize,
	log_every: usize,
}

impl Default for RefreshTracker {
	fn default() -> Self {
		Self::new(20)
	}
}

impl RefreshTracker {
	/// Create a tracker that logs a summary every `log_every` refreshes
	pub fn new(log_every: usize) -> Self {
		Self {
			levels: BTreeMap::new(),
			optimistic_applied: 0,
			consecutive_failures: 0,
			last_items_remaining: None,
			since_last_log: 0,
			log_every: log_every.max(1),
		}
	}

	/// Record a completed refresh
	pub fn record_success(&mut self, commitment: Commitment, view: &SaleView) {
		self.levels.entry(commitment).or_default().succeeded += 1;
		if self.consecutive_failures > 0 {
			info!(
				"Refresh recovered after {} failed attempts",
				self.consecutive_failures
			);
		}
		self.consecutive_failures = 0;

		if let Some(previous) = self.last_items_remaining {
			if previous != view.items_remaining {
				info!(
					"Remaining supply moved from {} to {}",
					previous, view.items_remaining
				);
			}
		}
		self.last_items_remaining = Some(view.items_remaining);
		self.since_last_log += 1;
	}

	/// Record a failed refresh
	pub fn record_failure(&mut self, commitment: Commitment) {
		self.levels.entry(commitment).or_default().failed += 1;
		self.consecutive_failures += 1;
		if self.consecutive_failures > 1 {
			warn!("{} consecutive refreshes failed", self.consecutive_failures);
		}
		self.since_last_log += 1;
	}

	pub fn record_optimistic(&mut self) {
		self.optimistic_applied += 1;
	}

	/// Log the summary every `log_every` refreshes, or now when `force` is set
	pub fn log_progress(&mut self, force: bool) {
		if force || self.since_last_log >= self.log_every {
			info!("{}", self.get_stats().summary());
			self.since_last_log = 0;
		}
	}

	pub fn get_stats(&self) -> RefreshStats {
		RefreshStats {
			levels: self.levels.clone(),
			optimistic_applied: self.optimistic_applied,
			consecutive_failures: self.consecutive_failures,
			last_items_remaining: self.last_items_remaining,
		}
	}
}

/// Statistics about the refreshes performed so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStats {
	pub levels: BTreeMap<Commitment, LevelCounts>,
	pub optimistic_applied: usize,
	pub consecutive_failures: usize,
	pub last_items_remaining: Option<u64>,
}

impl RefreshStats {
	pub fn at(&self, commitment: Commitment) -> LevelCounts {
		self.levels.get(&commitment).copied().unwrap_or_default()
	}

	pub fn total_succeeded(&self) -> usize {
		self.levels.values().map(|c| c.succeeded).sum()
	}

	pub fn total_failed(&self) -> usize {
		self.levels.values().map(|c| c.failed).sum()
	}

	/// Get a human-readable summary of the refresh statistics
	pub fn summary(&self) -> String {
		let levels = self
			.levels
			.iter()
			.map(|(commitment, counts)| {
				format!("{} {}/{}", commitment, counts.succeeded, counts.succeeded + counts.failed)
			})
			.collect::<Vec<_>>()
			.join(", ");

		format!(
			"Refreshes: {} ok, {} failed [{}], {} optimistic{}",
			self.total_succeeded(),
			self.total_failed(),
			levels,
			self.optimistic_applied,
			match self.last_items_remaining {
				Some(remaining) => format!(", {} remaining", remaining),
				None => String::new(),
			}
		)
	}
}
