//! Per-identity mint quota backed by the external ledger.

use super::ledger::QuotaLedger;
use super::origin::OriginResolver;
use super::types::*;

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

/// Default number of mints allowed per identity
pub const DEFAULT_QUOTA_CAP: u32 = 5;

/// Folds the ledger's mint count into eligibility
pub struct QuotaTracker {
	ledger: Arc<dyn QuotaLedger>,
	origin: Arc<dyn OriginResolver>,
	cap: u32,
	policy: LedgerPolicy,
}

impl QuotaTracker {
	pub fn new(ledger: Arc<dyn QuotaLedger>, origin: Arc<dyn OriginResolver>) -> Self {
		Self {
			ledger,
			origin,
			cap: DEFAULT_QUOTA_CAP,
			policy: LedgerPolicy::default(),
		}
	}

	pub fn with_cap(mut self, cap: u32) -> Self {
		self.cap = cap;
		self
	}

	pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn cap(&self) -> u32 {
		self.cap
	}

	/// Current mint count of `identity` as the ledger reports it.
	///
	/// Ledger and origin failures are returned as is, without applying the policy.
	pub async fn current_count(&self, identity: &Pubkey) -> Result<u32, QuotaError> {
		let claims = self.claims(identity, 0).await?;
		let count = self
			.ledger
			.find(&claims)
			.await?
			.map(|record| record.mint_count)
			.unwrap_or(0);
		Ok(count)
	}

	/// Check whether `identity` may mint once more.
	///
	/// # Errors
	/// `Exceeded` once the count reaches the cap. When the ledger cannot be read the error
	/// is returned under `FailClosed`; `FailOpen` yields `QuotaStatus::Unknown` instead.
	pub async fn check_eligible(&self, identity: &Pubkey) -> Result<QuotaStatus, QuotaError> {
		let count = match self.current_count(identity).await {
			Ok(count) => count,
			Err(e) => {
				return match self.policy {
					LedgerPolicy::FailClosed => {
						warn!("Quota ledger unreadable for {}, refusing mint: {}", identity, e);
						Err(e)
					}
					LedgerPolicy::FailOpen => {
						warn!("Quota ledger unreadable for {}, allowing mint: {}", identity, e);
						Ok(QuotaStatus::Unknown)
					}
				};
			}
		};

		if count >= self.cap {
			info!("{} reached the mint quota ({}/{})", identity, count, self.cap);
			return Err(QuotaError::Exceeded {
				count,
				cap: self.cap,
			});
		}

		info!("{} has minted {}/{}", identity, count, self.cap);
		Ok(QuotaStatus::Counted(count))
	}

	/// Record the identity's mint count after a confirmed mint
	pub async fn record_mint(&self, identity: &Pubkey, count: u32) -> Result<(), QuotaError> {
		let claims = self.claims(identity, count).await?;
		self.ledger.record(&claims).await
	}

	async fn claims(&self, identity: &Pubkey, mint_count: u32) -> Result<QuotaClaims, QuotaError> {
		Ok(QuotaClaims {
			public_key: identity.to_string(),
			ip_address: self.origin.origin().await?,
			mint_count,
		})
	}
}
