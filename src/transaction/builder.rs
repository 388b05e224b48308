//! Mint transaction builder
//!
//! This module provides a builder pattern for assembling the setup, mint and
//! caller-supplied transactions from instruction lists.

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::transaction::Transaction;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug, Clone, Serialize)]
pub enum TransactionError {
	#[error("Transaction validation error: {0}")]
	ValidationError(String),

	#[error("Unexpected error: {0}")]
	UnexpectedError(String),
}

/// Builder for one unsigned (or partially signed) transaction
pub struct TransactionBuilder {
	/// Fee payer, always the wallet
	payer: Option<Pubkey>,
	/// Blockhash the transaction is valid against
	blockhash: Option<Hash>,
	instructions: Vec<Instruction>,
	/// Additional keypairs signing before the wallet, such as a fresh mint identity
	extra_signers: Vec<Arc<Keypair>>,
}

impl TransactionBuilder {
	/// Creates a new transaction builder
	pub fn new() -> Self {
		Self {
			payer: None,
			blockhash: None,
			instructions: Vec::new(),
			extra_signers: Vec::new(),
		}
	}

	/// Sets the fee payer
	pub fn with_payer(mut self, payer: Pubkey) -> Self {
		self.payer = Some(payer);
		self
	}

	/// Sets the recent blockhash
	pub fn with_blockhash(mut self, blockhash: Hash) -> Self {
		self.blockhash = Some(blockhash);
		self
	}

	/// Appends instructions, keeping their order
	pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
		self.instructions.extend(instructions);
		self
	}

	/// Adds a keypair that signs the transaction at build time
	pub fn with_extra_signer(mut self, signer: Arc<Keypair>) -> Self {
		self.extra_signers.push(signer);
		self
	}

	/// Builds the transaction and applies the extra signatures.
	///
	/// The wallet signature is left for the signer collaborator.
	pub fn build(self) -> Result<Transaction, TransactionError> {
		let payer = self
			.payer
			.ok_or_else(|| TransactionError::ValidationError("missing fee payer".to_string()))?;
		let blockhash = self
			.blockhash
			.ok_or_else(|| TransactionError::ValidationError("missing blockhash".to_string()))?;

		if self.instructions.is_empty() {
			return Err(TransactionError::ValidationError(
				"transaction has no instructions".to_string(),
			));
		}

		let mut transaction = Transaction::new_with_payer(&self.instructions, Some(&payer));
		transaction.message.recent_blockhash = blockhash;

		for signer in &self.extra_signers {
			transaction
				.try_partial_sign(&[&**signer], blockhash)
				.map_err(|e| {
					error!("Extra signer could not sign: {}", e);
					TransactionError::ValidationError(format!("extra signer rejected: {}", e))
				})?;
		}

		debug!(
			"Built transaction with {} instruction(s), {} account(s)",
			transaction.message.instructions.len(),
			transaction.message.account_keys.len()
		);
		Ok(transaction)
	}
}

impl Default for TransactionBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Serialize a signed transaction into its wire form.
///
/// Fails if the result does not fit a single packet.
pub fn serialize_transaction(transaction: &Transaction) -> Result<Vec<u8>, TransactionError> {
	let bytes = bincode::serialize(transaction)
		.map_err(|e| TransactionError::UnexpectedError(format!("serialization failed: {}", e)))?;

	if bytes.len() > PACKET_DATA_SIZE {
		return Err(TransactionError::ValidationError(format!(
			"transaction is {} bytes, limit is {}",
			bytes.len(),
			PACKET_DATA_SIZE
		)));
	}
	Ok(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use solana_sdk::instruction::AccountMeta;
	use solana_sdk::signature::Signer;

	fn instruction(accounts: Vec<AccountMeta>, data_len: usize) -> Instruction {
		Instruction::new_with_bytes(Pubkey::new_unique(), &vec![9u8; data_len], accounts)
	}

	#[test]
	fn extra_signer_signs_before_the_wallet() {
		let payer = Pubkey::new_unique();
		let mint = Arc::new(Keypair::new());

		let transaction = TransactionBuilder::new()
			.with_payer(payer)
			.with_blockhash(Hash::new_from_array([1; 32]))
			.with_instructions([instruction(
				vec![AccountMeta::new(payer, true), AccountMeta::new(mint.pubkey(), true)],
				8,
			)])
			.with_extra_signer(mint.clone())
			.build()
			.unwrap();

		// wallet slot is still empty, mint slot is filled
		assert!(!transaction.is_signed());
		let signed_keys: Vec<_> = transaction
			.message
			.account_keys
			.iter()
			.zip(&transaction.signatures)
			.filter(|(_, signature)| **signature != Default::default())
			.map(|(key, _)| *key)
			.collect();
		assert_eq!(signed_keys, vec![mint.pubkey()]);
	}

	#[test]
	fn build_requires_payer_blockhash_and_instructions() {
		let result = TransactionBuilder::new()
			.with_blockhash(Hash::default())
			.with_instructions([instruction(vec![], 1)])
			.build();
		assert!(matches!(result, Err(TransactionError::ValidationError(_))));

		let result = TransactionBuilder::new()
			.with_payer(Pubkey::new_unique())
			.with_blockhash(Hash::default())
			.build();
		assert!(matches!(result, Err(TransactionError::ValidationError(_))));
	}

	#[test]
	fn oversized_transaction_is_refused() {
		let payer = Pubkey::new_unique();
		let transaction = TransactionBuilder::new()
			.with_payer(payer)
			.with_blockhash(Hash::default())
			.with_instructions([instruction(vec![AccountMeta::new(payer, true)], 1300)])
			.build()
			.unwrap();

		assert!(matches!(
			serialize_transaction(&transaction),
			Err(TransactionError::ValidationError(_))
		));
	}
}
