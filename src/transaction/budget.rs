//! Size estimate deciding whether account setup needs its own transaction.

use crate::sale::SaleConfig;

use serde::{Deserialize, Serialize};

/// Per-feature byte costs of the combined setup and mint transaction.
///
/// The defaults follow the sale program's instruction layout against the 1232 byte packet
/// limit, minus the signature slack the wallet needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBudget {
	/// Setup plus mint with no optional feature enabled
	pub base: usize,
	/// Collection retained by the sale authority
	pub collection: usize,
	/// Payment in a non-native token
	pub token_payment: usize,
	pub whitelist: usize,
	/// Additional cost when the whitelist token is burned
	pub whitelist_burn: usize,
	pub gatekeeper: usize,
	/// Additional cost when the gateway token expires on use
	pub gatekeeper_expire: usize,
	/// Largest estimate that still fits a single transaction
	pub limit: usize,
}

impl Default for TransactionBudget {
	fn default() -> Self {
		Self {
			base: 892,
			collection: 182,
			token_payment: 66,
			whitelist: 34,
			whitelist_burn: 34,
			gatekeeper: 33,
			gatekeeper_expire: 66,
			limit: 1230,
		}
	}
}

impl TransactionBudget {
	/// Estimated size of setup and mint combined.
	///
	/// `collection_present` is whether the collection marker account exists for the sale.
	pub fn estimate(&self, config: &SaleConfig, collection_present: bool) -> usize {
		let mut size = self.base;

		if collection_present && config.retain_authority {
			size += self.collection;
		}
		if config.token_mint.is_some() {
			size += self.token_payment;
		}
		if config.whitelist.is_some() {
			size += self.whitelist;
			if config.burns_whitelist_token() {
				size += self.whitelist_burn;
			}
		}
		if let Some(gatekeeper) = &config.gatekeeper {
			size += self.gatekeeper;
			if gatekeeper.expire_on_use {
				size += self.gatekeeper_expire;
			}
		}

		size
	}

	pub fn requires_split(&self, config: &SaleConfig, collection_present: bool) -> bool {
		self.estimate(config, collection_present) > self.limit
	}
}
