use crate::chain::ChainError;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// When a sale stops accepting mints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndSetting {
	/// Unix timestamp (seconds) after which the sale is ended
	Date(i64),
	/// Cap on the number of items sold
	Amount(u64),
}

/// What happens to the whitelist token when it is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhitelistMode {
	BurnEveryTime,
	NeverBurn,
}

/// Allowlist granting early or discounted access to holders of `mint`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistSettings {
	pub mint: Pubkey,
	pub mode: WhitelistMode,
	pub discount_price: Option<u64>,
	/// Holders may mint before the go-live date
	pub presale: bool,
}

/// Third-party human verification required before minting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatekeeperSettings {
	pub network: Pubkey,
	/// The verification token is consumed by each mint
	pub expire_on_use: bool,
}

/// Decoded sale configuration account.
///
/// Produced wholesale by every fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
	/// Address of the sale account this snapshot was read from
	pub address: Pubkey,
	pub authority: Pubkey,
	/// Account receiving the sale proceeds
	pub treasury: Pubkey,
	pub items_available: u64,
	pub items_redeemed: u64,
	/// Price in lamports, or in the payment token's smallest unit when `token_mint` is set
	pub price: u64,
	pub symbol: String,
	pub go_live_date: Option<i64>,
	pub end_setting: Option<EndSetting>,
	pub whitelist: Option<WhitelistSettings>,
	pub gatekeeper: Option<GatekeeperSettings>,
	/// Non-native payment token
	pub token_mint: Option<Pubkey>,
	pub retain_authority: bool,
}

impl SaleConfig {
	/// Supply cap after applying an amount-based end setting
	pub fn effective_cap(&self) -> u64 {
		match self.end_setting {
			Some(EndSetting::Amount(limit)) => self.items_available.min(limit),
			_ => self.items_available,
		}
	}

	pub fn burns_whitelist_token(&self) -> bool {
		matches!(
			self.whitelist,
			Some(WhitelistSettings {
				mode: WhitelistMode::BurnEveryTime,
				..
			})
		)
	}
}

/// Accounts read next to the sale configuration on every refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryAccounts {
	/// Whitelist tokens held by the wallet, 0 when there is no whitelist or no token account
	pub whitelist_balance: u64,
	/// Whether the collection marker account exists for this sale
	pub collection_present: bool,
	/// Native balance of the wallet in lamports
	pub wallet_balance: u64,
}

/// Sale state as presented to the user, derived from a `SaleConfig`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleView {
	pub is_active: bool,
	pub is_ended: bool,
	pub is_sold_out: bool,
	/// Whitelist sale with the presale flag set, before go-live
	pub is_presale: bool,
	/// Read from the configured flags, not from `is_presale`: a whitelist without a
	/// discount price whose presale flag is clear. A presale whitelist stays false here
	/// after go-live, when the sale opens to everyone.
	pub is_whitelist_only: bool,
	/// Price in base units the wallet would pay
	pub price: u64,
	/// Price in display units
	pub price_ui: f64,
	pub price_label: String,
	pub items_cap: u64,
	pub items_redeemed: u64,
	pub items_remaining: u64,
	pub whitelist_token_balance: u64,
}

impl SaleView {
	/// Return the view as it would look after `delta` landed.
	///
	/// The result is a new value; it is thrown away as soon as a real refresh completes.
	pub fn with_optimistic(&self, delta: &OptimisticDelta) -> SaleView {
		let items_remaining = self.items_remaining.saturating_sub(delta.minted);
		let whitelist_token_balance = self
			.whitelist_token_balance
			.saturating_sub(delta.whitelist_burned);
		let is_sold_out = self.is_sold_out || items_remaining == 0;

		let mut is_active = self.is_active && !is_sold_out;
		if delta.whitelist_burned > 0 && (self.is_presale || self.is_whitelist_only) {
			is_active = is_active && whitelist_token_balance > 0;
		}

		SaleView {
			is_active,
			is_sold_out,
			items_remaining,
			items_redeemed: self.items_redeemed.saturating_add(delta.minted),
			whitelist_token_balance,
			..self.clone()
		}
	}
}

/// Local effect of a confirmed mint, shown until the next refresh lands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimisticDelta {
	pub minted: u64,
	pub whitelist_burned: u64,
	/// Lamports spent, price plus the estimated account fees
	pub lamports_spent: u64,
}

/// Error types for reading the sale from chain
#[derive(Debug, Clone, thiserror::Error)]
pub enum SaleError {
	#[error("Sale account {0} does not exist")]
	ConfigNotFound(Pubkey),

	#[error("RPC unavailable: {0}")]
	RpcUnavailable(String),

	#[error("Invalid sale account: {0}")]
	InvalidAccount(String),
}

impl From<ChainError> for SaleError {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::RpcUnavailable(msg) => SaleError::RpcUnavailable(msg),
			other => SaleError::InvalidAccount(other.to_string()),
		}
	}
}
