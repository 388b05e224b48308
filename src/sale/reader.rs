//!
//! Reader for the sale configuration and the accounts around it.
//!
//! The reader performs network reads only. Each call returns a freshly decoded snapshot;
//! nothing is cached between calls.

use super::account::{associated_token_address, collection_address, decode_sale_account};
use super::types::*;
use crate::chain::{Commitment, RpcConnection};

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches and decodes the sale account
#[derive(Clone)]
pub struct SaleStateReader {
	connection: Arc<dyn RpcConnection>,
}

impl SaleStateReader {
	pub fn new(connection: Arc<dyn RpcConnection>) -> Self {
		Self { connection }
	}

	/// Fetch the sale configuration at `sale`.
	///
	/// # Errors
	/// `ConfigNotFound` when no account exists at the address, `RpcUnavailable` when the
	/// connection cannot be reached.
	pub async fn fetch(&self, sale: &Pubkey, commitment: Commitment) -> Result<SaleConfig, SaleError> {
		let data = self
			.connection
			.get_account_info(sale, commitment)
			.await?
			.ok_or(SaleError::ConfigNotFound(*sale))?;

		let config = decode_sale_account(*sale, &data)?;
		info!(
			"Fetched sale {} at {}: {}/{} redeemed, price {}",
			sale, commitment, config.items_redeemed, config.items_available, config.price
		);
		Ok(config)
	}

	/// Fetch the whitelist balance, collection marker and wallet balance for a sale.
	pub async fn fetch_auxiliary(
		&self,
		config: &SaleConfig,
		wallet: &Pubkey,
		commitment: Commitment,
	) -> Result<AuxiliaryAccounts, SaleError> {
		let collection = collection_address(&config.address);

		let (collection_account, wallet_balance, whitelist_balance) = futures::join!(
			self.connection.get_account_info(&collection, commitment),
			self.connection.get_balance(wallet),
			self.whitelist_balance(config, wallet),
		);

		let auxiliary = AuxiliaryAccounts {
			whitelist_balance,
			collection_present: collection_account?.is_some(),
			wallet_balance: wallet_balance?,
		};
		debug!("Auxiliary accounts for sale {}: {:?}", config.address, auxiliary);
		Ok(auxiliary)
	}

	/// Whitelist tokens held by the wallet; a missing token account counts as zero
	async fn whitelist_balance(&self, config: &SaleConfig, wallet: &Pubkey) -> u64 {
		let Some(whitelist) = &config.whitelist else {
			return 0;
		};

		let token_account = associated_token_address(wallet, &whitelist.mint);
		match self.connection.get_token_account_balance(&token_account).await {
			Ok(balance) => balance,
			Err(e) => {
				warn!(
					"Could not read whitelist balance at {}, assuming 0: {}",
					token_account, e
				);
				0
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::mock::MockConnection;
	use crate::sale::account::encode_sale_account;

	fn config_at(address: Pubkey) -> SaleConfig {
		SaleConfig {
			address,
			authority: Pubkey::new_unique(),
			treasury: Pubkey::new_unique(),
			items_available: 10,
			items_redeemed: 3,
			price: 5,
			symbol: "VAMP".to_string(),
			go_live_date: None,
			end_setting: None,
			whitelist: Some(WhitelistSettings {
				mint: Pubkey::new_unique(),
				mode: WhitelistMode::NeverBurn,
				discount_price: None,
				presale: false,
			}),
			gatekeeper: None,
			token_mint: None,
			retain_authority: true,
		}
	}

	#[tokio::test]
	async fn fetch_decodes_at_requested_commitment() {
		let connection = Arc::new(MockConnection::new());
		let sale = Pubkey::new_unique();
		let config = config_at(sale);
		connection.set_account(sale, encode_sale_account(&config));

		let reader = SaleStateReader::new(connection.clone());
		let fetched = reader.fetch(&sale, Commitment::Processed).await.unwrap();

		assert_eq!(fetched, config);
		assert_eq!(
			connection.account_reads.lock().unwrap().as_slice(),
			&[(sale, Commitment::Processed)]
		);
	}

	#[tokio::test]
	async fn missing_account_is_config_not_found() {
		let reader = SaleStateReader::new(Arc::new(MockConnection::new()));
		let sale = Pubkey::new_unique();

		let err = reader.fetch(&sale, Commitment::Confirmed).await.unwrap_err();
		assert!(matches!(err, SaleError::ConfigNotFound(addr) if addr == sale));
	}

	#[tokio::test]
	async fn unreachable_connection_is_rpc_unavailable() {
		let connection = Arc::new(MockConnection::new());
		connection.set_unavailable(true);
		let reader = SaleStateReader::new(connection);

		let err = reader
			.fetch(&Pubkey::new_unique(), Commitment::Confirmed)
			.await
			.unwrap_err();
		assert!(matches!(err, SaleError::RpcUnavailable(_)));
	}

	#[tokio::test]
	async fn auxiliary_reads_whitelist_collection_and_balance() {
		let connection = Arc::new(MockConnection::new());
		let sale = Pubkey::new_unique();
		let wallet = Pubkey::new_unique();
		let config = config_at(sale);
		let whitelist_mint = config.whitelist.as_ref().unwrap().mint;

		connection.set_balance(wallet, 2_000_000_000);
		connection.set_token_balance(associated_token_address(&wallet, &whitelist_mint), 3);
		connection.set_account(collection_address(&sale), vec![0u8; 8]);

		let reader = SaleStateReader::new(connection);
		let auxiliary = reader
			.fetch_auxiliary(&config, &wallet, Commitment::Confirmed)
			.await
			.unwrap();

		assert_eq!(
			auxiliary,
			AuxiliaryAccounts {
				whitelist_balance: 3,
				collection_present: true,
				wallet_balance: 2_000_000_000,
			}
		);
	}

	#[tokio::test]
	async fn missing_whitelist_token_account_counts_as_zero() {
		let connection = Arc::new(MockConnection::new());
		let config = config_at(Pubkey::new_unique());

		let reader = SaleStateReader::new(connection);
		let auxiliary = reader
			.fetch_auxiliary(&config, &Pubkey::new_unique(), Commitment::Confirmed)
			.await
			.unwrap();

		assert_eq!(auxiliary.whitelist_balance, 0);
		assert!(!auxiliary.collection_present);
	}
}
