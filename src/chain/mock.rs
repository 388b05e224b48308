//! Scripted in-memory connection for tests

use super::client::RpcConnection;
use super::types::*;
use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the mock network does with the next submitted transaction
#[derive(Debug, Clone)]
pub enum StatusPlan {
	/// Lands and reaches the given commitment
	Land(Commitment),
	/// Lands with a custom program error
	Fail(u32),
	/// Never shows up
	Vanish,
	/// Rejected at submission by preflight with a custom program error
	RejectOnSend(u32),
}

type LandingHook = Box<dyn Fn(&Transaction) -> Vec<Pubkey> + Send + Sync>;

#[derive(Default)]
pub struct MockConnection {
	accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
	balances: Mutex<HashMap<Pubkey, u64>>,
	token_balances: Mutex<HashMap<Pubkey, u64>>,
	plans: Mutex<VecDeque<StatusPlan>>,
	statuses: Mutex<HashMap<Signature, StatusPlan>>,
	/// Derives the accounts a landed transaction creates
	landing_hook: Mutex<Option<LandingHook>>,
	unavailable: Mutex<bool>,
	pub sends: AtomicUsize,
	pub status_polls: AtomicUsize,
	pub account_reads: Mutex<Vec<(Pubkey, Commitment)>>,
	pub rpc_calls: AtomicUsize,
}

impl MockConnection {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
		self.accounts.lock().unwrap().insert(address, data);
	}

	pub fn remove_account(&self, address: &Pubkey) {
		self.accounts.lock().unwrap().remove(address);
	}

	pub fn set_balance(&self, address: Pubkey, lamports: u64) {
		self.balances.lock().unwrap().insert(address, lamports);
	}

	pub fn set_token_balance(&self, address: Pubkey, amount: u64) {
		self.token_balances.lock().unwrap().insert(address, amount);
	}

	pub fn set_unavailable(&self, unavailable: bool) {
		*self.unavailable.lock().unwrap() = unavailable;
	}

	/// Queue the behavior of the next submitted transaction
	pub fn push_plan(&self, plan: StatusPlan) {
		self.plans.lock().unwrap().push_back(plan);
	}

	/// Create the accounts returned by `hook` whenever a transaction lands
	pub fn on_land(&self, hook: impl Fn(&Transaction) -> Vec<Pubkey> + Send + Sync + 'static) {
		*self.landing_hook.lock().unwrap() = Some(Box::new(hook));
	}

	pub fn send_count(&self) -> usize {
		self.sends.load(Ordering::SeqCst)
	}

	fn check_available(&self) -> Result<(), ChainError> {
		self.rpc_calls.fetch_add(1, Ordering::SeqCst);
		if *self.unavailable.lock().unwrap() {
			return Err(ChainError::RpcUnavailable(
				"connection refused".to_string(),
			));
		}
		Ok(())
	}
}

#[async_trait]
impl RpcConnection for MockConnection {
	async fn get_account_info(
		&self,
		address: &Pubkey,
		commitment: Commitment,
	) -> Result<Option<Vec<u8>>, ChainError> {
		self.check_available()?;
		self.account_reads
			.lock()
			.unwrap()
			.push((*address, commitment));
		Ok(self.accounts.lock().unwrap().get(address).cloned())
	}

	async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
		self.check_available()?;
		Ok(self
			.balances
			.lock()
			.unwrap()
			.get(address)
			.copied()
			.unwrap_or(0))
	}

	async fn get_token_account_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
		self.check_available()?;
		self.token_balances
			.lock()
			.unwrap()
			.get(address)
			.copied()
			.ok_or_else(|| {
				ChainError::RpcUnavailable(format!("could not find account {}", address))
			})
	}

	async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
		self.check_available()?;
		Ok(Hash::new_from_array([7u8; 32]))
	}

	async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainError> {
		self.check_available()?;
		assert!(!bytes.is_empty(), "empty transaction submitted");

		let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
		let plan = self
			.plans
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or(StatusPlan::Land(Commitment::Confirmed));

		if let StatusPlan::RejectOnSend(code) = plan {
			return Err(ChainError::TransactionRejected(TransactionFailure::new(
				Some(code),
				format!("custom program error: {:#x}", code),
			)));
		}

		let mut raw = [0u8; 64];
		raw[..8].copy_from_slice(&(n as u64).to_le_bytes());
		let signature = Signature::from(raw);

		if matches!(plan, StatusPlan::Land(_)) {
			if let (Some(hook), Ok(transaction)) = (
				self.landing_hook.lock().unwrap().as_ref(),
				bincode::deserialize::<Transaction>(bytes),
			) {
				for address in hook(&transaction) {
					self.set_account(address, vec![1]);
				}
			}
		}
		self.statuses.lock().unwrap().insert(signature, plan);
		Ok(signature)
	}

	async fn get_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError> {
		self.check_available()?;
		self.status_polls.fetch_add(1, Ordering::SeqCst);

		let status = match self.statuses.lock().unwrap().get(signature) {
			Some(StatusPlan::Land(commitment)) => Some(SignatureStatus {
				commitment: *commitment,
				err: None,
			}),
			Some(StatusPlan::Fail(code)) => Some(SignatureStatus {
				commitment: Commitment::Confirmed,
				err: Some(TransactionFailure::new(
					Some(*code),
					format!("Error processing Instruction 0: custom program error: {:#x}", code),
				)),
			}),
			_ => None,
		};
		Ok(status)
	}
}
