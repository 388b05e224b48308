use crate::chain::Commitment;
use crate::quota::QuotaStatus;
use crate::sale::{AuxiliaryAccounts, OptimisticDelta, SaleConfig, SaleError, SaleView};

use thiserror::Error;

/// Everything one refresh learned about the sale, published as a single value
#[derive(Debug, Clone, PartialEq)]
pub struct SaleSnapshot {
	pub config: SaleConfig,
	pub auxiliary: AuxiliaryAccounts,
	pub view: SaleView,
	/// Ledger count of the wallet, `None` when no quota tracker is configured
	pub quota: Option<QuotaStatus>,
	/// Consistency level the configuration was read at
	pub commitment: Commitment,
	/// Set when the view carries an optimistic delta instead of chain state
	pub optimistic: bool,
	/// Unix time (seconds) the view was derived at
	pub derived_at: i64,
}

impl SaleSnapshot {
	/// Snapshot as it would look once `delta` lands on chain
	pub fn with_optimistic(&self, delta: &OptimisticDelta) -> SaleSnapshot {
		let auxiliary = AuxiliaryAccounts {
			whitelist_balance: self
				.auxiliary
				.whitelist_balance
				.saturating_sub(delta.whitelist_burned),
			wallet_balance: self
				.auxiliary
				.wallet_balance
				.saturating_sub(delta.lamports_spent),
			..self.auxiliary.clone()
		};
		let quota = match self.quota {
			Some(QuotaStatus::Counted(count)) => {
				Some(QuotaStatus::Counted(count.saturating_add(delta.minted as u32)))
			}
			other => other,
		};

		SaleSnapshot {
			view: self.view.with_optimistic(delta),
			auxiliary,
			quota,
			optimistic: true,
			..self.clone()
		}
	}
}

/// Requests accepted by the sync loop
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
	/// Re-read the sale at the given consistency level
	Refresh(Commitment),
	/// Publish the last snapshot with a local delta applied
	ApplyOptimistic(OptimisticDelta),
}

#[derive(Error, Debug)]
pub enum SyncError {
	#[error("Refresh failed: {0}")]
	Refresh(#[from] SaleError),

	#[error("Event handler error: {0}")]
	Handler(String),

	#[error("Sync loop has stopped")]
	Stopped,
}
