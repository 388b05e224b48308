//! Seam for the sale program's instruction encoding.

use crate::sale::SaleConfig;
use crate::sale::account::metadata_address;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

/// Accounts a mint is built around
#[derive(Debug, Clone)]
pub struct MintAccounts<'a> {
	pub config: &'a SaleConfig,
	/// Wallet paying for and receiving the token
	pub payer: Pubkey,
	/// Address of the new token mint, signed for by a fresh keypair
	pub mint: Pubkey,
	pub collection_present: bool,
}

impl MintAccounts<'_> {
	/// Metadata account created by a successful mint
	pub fn metadata(&self) -> Pubkey {
		metadata_address(&self.mint)
	}
}

/// Produces the instructions for one mint.
///
/// Setup instructions create the mint and token accounts and are the only ones the mint
/// keypair signs. The orchestrator decides whether they travel in their own transaction.
pub trait MintInstructionBuilder: Send + Sync {
	fn setup_instructions(&self, accounts: &MintAccounts<'_>) -> Vec<Instruction>;

	fn mint_instructions(&self, accounts: &MintAccounts<'_>) -> Vec<Instruction>;
}
