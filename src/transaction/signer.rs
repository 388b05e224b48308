//!
//! Signer collaborator.
//!
//! The engine never holds wallet keys itself; it hands unsigned transactions to a
//! `TransactionSigner` and submits whatever comes back. `KeypairSigner` is the local
//! implementation used by the binary and the tests.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer, read_keypair_file};
use solana_sdk::transaction::Transaction;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone)]
pub enum SignerError {
	#[error("Failed to load keypair: {0}")]
	KeypairLoad(String),

	#[error("Signing rejected: {0}")]
	Rejected(String),
}

/// Produces signed transactions on behalf of a wallet
#[async_trait]
pub trait TransactionSigner: Send + Sync {
	/// Stable public identity of the wallet
	fn pubkey(&self) -> Pubkey;

	async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, SignerError>;

	/// Sign a batch in order; the whole batch fails if any transaction is refused
	async fn sign_all_transactions(
		&self,
		transactions: Vec<Transaction>,
	) -> Result<Vec<Transaction>, SignerError> {
		let mut signed = Vec::with_capacity(transactions.len());
		for transaction in transactions {
			signed.push(self.sign_transaction(transaction).await?);
		}
		Ok(signed)
	}
}

/// Signer backed by a keypair held in memory
pub struct KeypairSigner {
	keypair: Keypair,
}

impl KeypairSigner {
	pub fn new(keypair: Keypair) -> Self {
		Self { keypair }
	}

	/// Load a keypair from a JSON keypair file
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignerError> {
		let path = path.as_ref();
		let keypair = read_keypair_file(path)
			.map_err(|e| SignerError::KeypairLoad(format!("{}: {}", path.display(), e)))?;
		info!("Loaded wallet {} from {}", keypair.pubkey(), path.display());
		Ok(Self { keypair })
	}
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
	fn pubkey(&self) -> Pubkey {
		self.keypair.pubkey()
	}

	async fn sign_transaction(
		&self,
		mut transaction: Transaction,
	) -> Result<Transaction, SignerError> {
		let blockhash = transaction.message.recent_blockhash;
		transaction
			.try_partial_sign(&[&self.keypair], blockhash)
			.map_err(|e| SignerError::Rejected(e.to_string()))?;

		debug!(
			"Signed transaction with {} instruction(s) as {}",
			transaction.message.instructions.len(),
			self.keypair.pubkey()
		);
		Ok(transaction)
	}
}
