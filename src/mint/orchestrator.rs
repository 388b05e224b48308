//!
//! Mint orchestration: optional account setup, then the mint itself.
//!
//! The orchestrator submits at most one setup transaction, the caller's extra
//! transactions and one mint transaction per attempt. It never retries a step; every
//! outcome is classified into `MintError` and reported upward.

use super::errors::{MintError, RejectionCause};
use super::instructions::{MintAccounts, MintInstructionBuilder};
use crate::chain::{ChainError, Commitment, RpcConnection};
use crate::sale::SaleConfig;
use crate::sale::account::metadata_address;
use crate::transaction::{
	ConfirmationOutcome, ConfirmationWaiter, SignerError, TransactionBudget, TransactionBuilder,
	TransactionSigner, serialize_transaction,
};
use crate::utils::{Cluster, explorer_token_url};

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default time to wait for each transaction to confirm
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Accounts created by a confirmed setup transaction
#[derive(Debug, Clone)]
pub struct SetupState {
	/// Keypair of the mint the setup created
	pub mint: Arc<Keypair>,
	pub signature: Signature,
}

/// Progress of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
	Pending,
	SetupConfirmed,
	MintConfirmed,
	MintFailed,
	Timeout,
}

/// State of one mint attempt, owned by the orchestrator while it runs
#[derive(Debug)]
pub struct MintAttempt {
	pub setup: Option<SetupState>,
	pub mint_signature: Option<Signature>,
	/// Metadata account the mint is expected to create
	pub metadata: Pubkey,
	pub outcome: AttemptOutcome,
}

impl MintAttempt {
	fn transition(&mut self, outcome: AttemptOutcome) {
		info!(
			"Mint attempt for metadata {}: {:?} -> {:?}",
			self.metadata, self.outcome, outcome
		);
		self.outcome = outcome;
	}
}

/// Everything one attempt needs, captured when the attempt starts
#[derive(Debug, Clone)]
pub struct MintRequest {
	/// Private copy of the sale configuration
	pub config: SaleConfig,
	pub collection_present: bool,
	/// Submitted and confirmed, in order, before the mint
	pub pre_transactions: Vec<Vec<Instruction>>,
	/// Submitted after the mint confirmed
	pub post_transactions: Vec<Vec<Instruction>>,
	/// Setup confirmed by an earlier attempt whose mint did not go through
	pub prior_setup: Option<SetupState>,
}

impl MintRequest {
	pub fn new(config: SaleConfig, collection_present: bool) -> Self {
		Self {
			config,
			collection_present,
			pre_transactions: Vec::new(),
			post_transactions: Vec::new(),
			prior_setup: None,
		}
	}

	pub fn with_pre_transaction(mut self, instructions: Vec<Instruction>) -> Self {
		self.pre_transactions.push(instructions);
		self
	}

	pub fn with_post_transaction(mut self, instructions: Vec<Instruction>) -> Self {
		self.post_transactions.push(instructions);
		self
	}

	pub fn with_prior_setup(mut self, setup: Option<SetupState>) -> Self {
		self.prior_setup = setup;
		self
	}
}

/// A confirmed mint
#[derive(Debug, Clone)]
pub struct MintReceipt {
	pub mint: Pubkey,
	pub signature: Signature,
	pub metadata: Pubkey,
	/// Commitment the mint transaction was confirmed at
	pub commitment: Commitment,
	pub explorer_url: String,
	/// Problems with the post-mint transactions; the mint itself succeeded
	pub warnings: Vec<String>,
}

/// A failed attempt together with the state it reached
#[derive(Debug, Error)]
#[error("{error}")]
pub struct MintFailure {
	pub error: MintError,
	pub attempt: MintAttempt,
}

impl MintFailure {
	/// Setup that the next attempt can reuse.
	///
	/// Only available when the mint transaction never executed: it was not submitted, or
	/// the program rejected it.
	pub fn reusable_setup(&self) -> Option<SetupState> {
		let mint_untouched = self.attempt.mint_signature.is_none()
			|| matches!(self.error, MintError::MintRejected(_));
		if mint_untouched {
			self.attempt.setup.clone()
		} else {
			None
		}
	}
}

/// Sequences setup and mint transactions for a wallet
pub struct MintOrchestrator {
	connection: Arc<dyn RpcConnection>,
	signer: Arc<dyn TransactionSigner>,
	instructions: Arc<dyn MintInstructionBuilder>,
	waiter: ConfirmationWaiter,
	budget: TransactionBudget,
	tx_timeout: Duration,
	cluster: Cluster,
}

impl MintOrchestrator {
	pub fn new(
		connection: Arc<dyn RpcConnection>,
		signer: Arc<dyn TransactionSigner>,
		instructions: Arc<dyn MintInstructionBuilder>,
	) -> Self {
		Self {
			waiter: ConfirmationWaiter::new(connection.clone()),
			connection,
			signer,
			instructions,
			budget: TransactionBudget::default(),
			tx_timeout: DEFAULT_TX_TIMEOUT,
			cluster: Cluster::MainnetBeta,
		}
	}

	pub fn with_budget(mut self, budget: TransactionBudget) -> Self {
		self.budget = budget;
		self
	}

	pub fn with_timeout(mut self, tx_timeout: Duration) -> Self {
		self.tx_timeout = tx_timeout;
		self
	}

	pub fn with_cluster(mut self, cluster: Cluster) -> Self {
		self.cluster = cluster;
		self
	}

	pub fn with_waiter(mut self, waiter: ConfirmationWaiter) -> Self {
		self.waiter = waiter;
		self
	}

	/// Wallet the orchestrator mints for
	pub fn wallet(&self) -> Pubkey {
		self.signer.pubkey()
	}

	/// Run one mint attempt.
	///
	/// # Errors
	/// Returns a `MintFailure` carrying the classified error and the attempt state, so a
	/// caller can keep a confirmed setup for the next attempt.
	pub async fn mint(&self, request: MintRequest) -> Result<MintReceipt, MintFailure> {
		let MintRequest {
			config,
			collection_present,
			pre_transactions,
			post_transactions,
			prior_setup,
		} = request;

		let mint = prior_setup
			.as_ref()
			.map(|setup| setup.mint.clone())
			.unwrap_or_else(|| Arc::new(Keypair::new()));

		let mut attempt = MintAttempt {
			setup: prior_setup,
			mint_signature: None,
			metadata: metadata_address(&mint.pubkey()),
			outcome: AttemptOutcome::Pending,
		};

		info!(
			"Starting mint of {} from sale {} for {}",
			mint.pubkey(),
			config.address,
			self.signer.pubkey()
		);

		let accounts = MintAccounts {
			config: &config,
			payer: self.signer.pubkey(),
			mint: mint.pubkey(),
			collection_present,
		};

		match self
			.run(&mut attempt, &accounts, mint, pre_transactions, post_transactions)
			.await
		{
			Ok(receipt) => Ok(receipt),
			Err(error) => {
				error!("Mint attempt failed ({:?}): {}", attempt.outcome, error);
				Err(MintFailure { error, attempt })
			}
		}
	}

	async fn run(
		&self,
		attempt: &mut MintAttempt,
		accounts: &MintAccounts<'_>,
		mint: Arc<Keypair>,
		pre_transactions: Vec<Vec<Instruction>>,
		post_transactions: Vec<Vec<Instruction>>,
	) -> Result<MintReceipt, MintError> {
		let split = self
			.budget
			.requires_split(accounts.config, accounts.collection_present);

		if split && attempt.setup.is_none() {
			info!(
				"Sale {} needs a separate setup transaction ({} bytes estimated)",
				accounts.config.address,
				self.budget
					.estimate(accounts.config, accounts.collection_present)
			);
			let setup = self.submit_setup(accounts, mint.clone()).await?;
			attempt.setup = Some(setup);
			attempt.transition(AttemptOutcome::SetupConfirmed);
		} else if attempt.setup.is_some() {
			info!("Reusing confirmed setup for mint {}", accounts.mint);
		}

		let include_setup = attempt.setup.is_none();
		let mut instructions = if include_setup {
			self.instructions.setup_instructions(accounts)
		} else {
			Vec::new()
		};
		instructions.extend(self.instructions.mint_instructions(accounts));

		let blockhash = self.latest_blockhash().await?;
		let mut mint_builder = TransactionBuilder::new()
			.with_payer(accounts.payer)
			.with_blockhash(blockhash)
			.with_instructions(instructions);
		if include_setup {
			mint_builder = mint_builder.with_extra_signer(mint);
		}

		let build = |instructions: Vec<Instruction>| {
			TransactionBuilder::new()
				.with_payer(accounts.payer)
				.with_blockhash(blockhash)
				.with_instructions(instructions)
				.build()
		};

		let pre_count = pre_transactions.len();
		let mut unsigned = pre_transactions
			.into_iter()
			.map(&build)
			.collect::<Result<Vec<_>, _>>()?;
		unsigned.push(mint_builder.build()?);
		for instructions in post_transactions {
			unsigned.push(build(instructions)?);
		}

		let requested = unsigned.len();
		let signed = self.signer.sign_all_transactions(unsigned).await?;
		if signed.len() != requested {
			return Err(MintError::Signing(SignerError::Rejected(format!(
				"signer returned {} of {} transactions",
				signed.len(),
				requested
			))));
		}
		let mut signed = signed.into_iter();

		for (index, transaction) in signed.by_ref().take(pre_count).enumerate() {
			self.submit_pre_transaction(index, &transaction).await?;
		}

		let mint_transaction = signed.next().ok_or_else(|| {
			MintError::Signing(SignerError::Rejected("mint transaction missing".to_string()))
		})?;
		let commitment = self.submit_mint(attempt, &mint_transaction).await?;

		// a confirmed transaction is not enough, the metadata account has to exist
		match self
			.connection
			.get_account_info(&attempt.metadata, Commitment::Processed)
			.await
		{
			Ok(Some(_)) => {}
			Ok(None) => {
				warn!(
					"Mint transaction confirmed but metadata {} does not exist",
					attempt.metadata
				);
				return Err(MintError::MintAmbiguous {
					signature: attempt.mint_signature,
					reason: "transaction confirmed but the metadata account was not found".to_string(),
				});
			}
			Err(e) => {
				return Err(MintError::MintAmbiguous {
					signature: attempt.mint_signature,
					reason: format!("metadata account could not be read: {}", e),
				});
			}
		}

		let mut warnings = Vec::new();
		for transaction in signed {
			if let Some(warning) = self.submit_post_transaction(&transaction).await {
				warn!("{}", warning);
				warnings.push(warning);
			}
		}

		let signature = attempt.mint_signature.unwrap_or_default();
		info!(
			"Minted {} in {} at {}",
			accounts.mint, signature, commitment
		);
		Ok(MintReceipt {
			mint: accounts.mint,
			signature,
			metadata: attempt.metadata,
			commitment,
			explorer_url: explorer_token_url(&accounts.mint, self.cluster),
			warnings,
		})
	}

	async fn submit_setup(
		&self,
		accounts: &MintAccounts<'_>,
		mint: Arc<Keypair>,
	) -> Result<SetupState, MintError> {
		let blockhash = self.latest_blockhash().await?;
		let transaction = TransactionBuilder::new()
			.with_payer(accounts.payer)
			.with_blockhash(blockhash)
			.with_instructions(self.instructions.setup_instructions(accounts))
			.with_extra_signer(mint.clone())
			.build()?;
		let transaction = self.signer.sign_transaction(transaction).await?;

		let signature = self.submit(&transaction).await.map_err(|e| match e {
			ChainError::TransactionRejected(failure) => {
				MintError::SetupFailed(RejectionCause::classify(&failure).to_string())
			}
			other => MintError::SetupFailed(other.to_string()),
		})?;
		info!("Submitted setup transaction {}", signature);

		match self.waiter.wait(&signature, self.tx_timeout, true).await {
			ConfirmationOutcome::Confirmed(_) => Ok(SetupState { mint, signature }),
			ConfirmationOutcome::Failed(failure) => Err(MintError::SetupFailed(
				RejectionCause::classify(&failure).to_string(),
			)),
			ConfirmationOutcome::Timeout => Err(MintError::SetupFailed(format!(
				"setup transaction {} not confirmed within {:?}",
				signature, self.tx_timeout
			))),
		}
	}

	async fn submit_pre_transaction(
		&self,
		index: usize,
		transaction: &Transaction,
	) -> Result<(), MintError> {
		let signature = self.submit(transaction).await.map_err(|e| {
			MintError::SetupFailed(format!("pre-mint transaction #{} rejected: {}", index, e))
		})?;
		info!("Submitted pre-mint transaction #{} {}", index, signature);

		match self.waiter.wait(&signature, self.tx_timeout, true).await {
			ConfirmationOutcome::Confirmed(_) => Ok(()),
			ConfirmationOutcome::Failed(failure) => Err(MintError::SetupFailed(format!(
				"pre-mint transaction {} failed: {}",
				signature, failure
			))),
			ConfirmationOutcome::Timeout => Err(MintError::SetupFailed(format!(
				"pre-mint transaction {} not confirmed within {:?}",
				signature, self.tx_timeout
			))),
		}
	}

	async fn submit_mint(
		&self,
		attempt: &mut MintAttempt,
		transaction: &Transaction,
	) -> Result<Commitment, MintError> {
		let signature = match self.submit(transaction).await {
			Ok(signature) => signature,
			Err(e) => {
				attempt.transition(AttemptOutcome::MintFailed);
				return Err(match e {
					ChainError::TransactionRejected(failure) => {
						MintError::MintRejected(RejectionCause::classify(&failure))
					}
					ChainError::RpcUnavailable(msg) => MintError::RpcUnavailable(msg),
					ChainError::Serialization(msg) => MintError::RpcUnavailable(msg),
				});
			}
		};
		attempt.mint_signature = Some(signature);
		info!("Submitted mint transaction {}", signature);

		match self.waiter.wait(&signature, self.tx_timeout, true).await {
			ConfirmationOutcome::Confirmed(commitment) => {
				attempt.transition(AttemptOutcome::MintConfirmed);
				Ok(commitment)
			}
			ConfirmationOutcome::Failed(failure) => {
				attempt.transition(AttemptOutcome::MintFailed);
				Err(MintError::MintRejected(RejectionCause::classify(&failure)))
			}
			ConfirmationOutcome::Timeout => {
				attempt.transition(AttemptOutcome::Timeout);
				Err(MintError::MintAmbiguous {
					signature: Some(signature),
					reason: format!("not confirmed within {:?}", self.tx_timeout),
				})
			}
		}
	}

	/// Post-mint failures are reported as warnings, the mint already went through
	async fn submit_post_transaction(&self, transaction: &Transaction) -> Option<String> {
		let signature = match self.submit(transaction).await {
			Ok(signature) => signature,
			Err(e) => return Some(format!("post-mint transaction rejected: {}", e)),
		};

		match self.waiter.wait(&signature, self.tx_timeout, true).await {
			ConfirmationOutcome::Confirmed(_) => None,
			ConfirmationOutcome::Failed(failure) => Some(format!(
				"post-mint transaction {} failed: {}",
				signature, failure
			)),
			ConfirmationOutcome::Timeout => Some(format!(
				"post-mint transaction {} not confirmed within {:?}",
				signature, self.tx_timeout
			)),
		}
	}

	async fn submit(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
		let bytes = serialize_transaction(transaction)
			.map_err(|e| ChainError::Serialization(e.to_string()))?;
		self.connection.send_raw_transaction(&bytes).await
	}

	async fn latest_blockhash(&self) -> Result<Hash, MintError> {
		self.connection
			.get_latest_blockhash()
			.await
			.map_err(|e| MintError::RpcUnavailable(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::mock::{MockConnection, StatusPlan};
	use crate::mint::instructions::stub::StubInstructions;
	use crate::transaction::KeypairSigner;
	use solana_sdk::instruction::AccountMeta;

	fn sale() -> SaleConfig {
		SaleConfig {
			address: Pubkey::new_unique(),
			authority: Pubkey::new_unique(),
			treasury: Pubkey::new_unique(),
			items_available: 100,
			items_redeemed: 99,
			price: 1_000_000_000,
			symbol: "VAMP".to_string(),
			go_live_date: Some(0),
			end_setting: None,
			whitelist: None,
			gatekeeper: None,
			token_mint: None,
			retain_authority: true,
		}
	}

	struct Harness {
		connection: Arc<MockConnection>,
		instructions: Arc<StubInstructions>,
		orchestrator: MintOrchestrator,
	}

	fn harness(split: bool) -> Harness {
		let connection = Arc::new(MockConnection::new());
		let instructions = Arc::new(StubInstructions::default());
		let budget = if split {
			TransactionBudget {
				limit: 0,
				..TransactionBudget::default()
			}
		} else {
			TransactionBudget::default()
		};
		let orchestrator = MintOrchestrator::new(
			connection.clone(),
			Arc::new(KeypairSigner::new(Keypair::new())),
			instructions.clone(),
		)
		.with_budget(budget)
		.with_cluster(Cluster::Devnet);

		Harness {
			connection,
			instructions,
			orchestrator,
		}
	}

	/// Landed transactions create the metadata of every account they touch
	fn materialize_metadata(connection: &MockConnection) {
		connection.on_land(|transaction| {
			transaction
				.message
				.account_keys
				.iter()
				.map(metadata_address)
				.collect()
		});
	}

	#[tokio::test(start_paused = true)]
	async fn single_transaction_mint_succeeds() {
		let h = harness(false);
		materialize_metadata(&h.connection);

		let receipt = h.orchestrator.mint(MintRequest::new(sale(), false)).await.unwrap();

		assert_eq!(h.connection.send_count(), 1);
		assert_eq!(receipt.metadata, metadata_address(&receipt.mint));
		assert_eq!(receipt.commitment, Commitment::Confirmed);
		assert!(receipt.explorer_url.ends_with("?cluster=devnet"));
		assert!(receipt.warnings.is_empty());
		// metadata was re-read at processed
		assert!(
			h.connection
				.account_reads
				.lock()
				.unwrap()
				.contains(&(receipt.metadata, Commitment::Processed))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_setup_never_submits_the_mint() {
		let h = harness(true);
		h.connection.push_plan(StatusPlan::Fail(0x1));

		let failure = h.orchestrator.mint(MintRequest::new(sale(), true)).await.unwrap_err();

		assert!(matches!(failure.error, MintError::SetupFailed(_)));
		assert_eq!(h.connection.send_count(), 1);
		assert!(h.instructions.mints.lock().unwrap().is_empty());
		assert!(failure.reusable_setup().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn setup_timeout_aborts_the_attempt() {
		let h = harness(true);
		h.connection.push_plan(StatusPlan::Vanish);

		let failure = h.orchestrator.mint(MintRequest::new(sale(), true)).await.unwrap_err();

		assert!(matches!(failure.error, MintError::SetupFailed(_)));
		assert_eq!(failure.attempt.outcome, AttemptOutcome::Pending);
		assert_eq!(h.connection.send_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn split_mint_submits_setup_then_mint() {
		let h = harness(true);
		materialize_metadata(&h.connection);

		let receipt = h.orchestrator.mint(MintRequest::new(sale(), true)).await.unwrap();

		assert_eq!(h.connection.send_count(), 2);
		assert_eq!(h.instructions.mints.lock().unwrap().as_slice(), &[receipt.mint]);
	}

	#[tokio::test(start_paused = true)]
	async fn missing_metadata_is_ambiguous() {
		let h = harness(false);

		let failure = h.orchestrator.mint(MintRequest::new(sale(), false)).await.unwrap_err();

		assert!(matches!(
			failure.error,
			MintError::MintAmbiguous {
				signature: Some(_),
				..
			}
		));
		assert_eq!(failure.attempt.outcome, AttemptOutcome::MintConfirmed);
	}

	#[tokio::test(start_paused = true)]
	async fn mint_timeout_is_ambiguous_and_drops_setup() {
		let h = harness(true);
		h.connection.push_plan(StatusPlan::Land(Commitment::Confirmed));
		h.connection.push_plan(StatusPlan::Vanish);

		let failure = h.orchestrator.mint(MintRequest::new(sale(), true)).await.unwrap_err();

		assert!(matches!(failure.error, MintError::MintAmbiguous { .. }));
		assert!(!failure.error.is_retryable());
		assert_eq!(failure.attempt.outcome, AttemptOutcome::Timeout);
		assert!(failure.attempt.setup.is_some());
		assert!(failure.reusable_setup().is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn program_errors_are_classified() {
		let h = harness(false);
		h.connection.push_plan(StatusPlan::RejectOnSend(0x137));
		let failure = h.orchestrator.mint(MintRequest::new(sale(), false)).await.unwrap_err();
		assert!(matches!(
			failure.error,
			MintError::MintRejected(RejectionCause::SoldOut)
		));

		h.connection.push_plan(StatusPlan::Fail(0x135));
		let failure = h.orchestrator.mint(MintRequest::new(sale(), false)).await.unwrap_err();
		assert!(matches!(
			failure.error,
			MintError::MintRejected(RejectionCause::InsufficientFunds)
		));
		assert_eq!(failure.attempt.outcome, AttemptOutcome::MintFailed);
	}

	#[tokio::test(start_paused = true)]
	async fn rejected_mint_keeps_setup_for_the_next_attempt() {
		let h = harness(true);
		materialize_metadata(&h.connection);
		h.connection.push_plan(StatusPlan::Land(Commitment::Confirmed));
		h.connection.push_plan(StatusPlan::Fail(0x138));

		let failure = h.orchestrator.mint(MintRequest::new(sale(), true)).await.unwrap_err();
		assert!(matches!(
			failure.error,
			MintError::MintRejected(RejectionCause::NotStarted)
		));
		let setup = failure.reusable_setup().expect("setup is reusable");
		assert_eq!(h.connection.send_count(), 2);

		let receipt = h
			.orchestrator
			.mint(MintRequest::new(sale(), true).with_prior_setup(Some(setup.clone())))
			.await
			.unwrap();

		// only the mint was sent again, into the same mint account
		assert_eq!(h.connection.send_count(), 3);
		assert_eq!(receipt.mint, setup.mint.pubkey());
	}

	#[tokio::test(start_paused = true)]
	async fn pre_transactions_run_before_the_mint() {
		let h = harness(false);
		materialize_metadata(&h.connection);
		let payer = h.orchestrator.wallet();
		let gateway = Instruction::new_with_bytes(
			Pubkey::new_unique(),
			&[42],
			vec![AccountMeta::new(payer, true)],
		);

		h.connection.push_plan(StatusPlan::Fail(0x1));
		let failure = h
			.orchestrator
			.mint(MintRequest::new(sale(), false).with_pre_transaction(vec![gateway.clone()]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, MintError::SetupFailed(_)));
		assert_eq!(h.connection.send_count(), 1);
		assert!(failure.attempt.mint_signature.is_none());

		let receipt = h
			.orchestrator
			.mint(MintRequest::new(sale(), false).with_pre_transaction(vec![gateway]))
			.await
			.unwrap();
		assert_eq!(h.connection.send_count(), 3);
		assert!(receipt.warnings.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn post_transaction_failure_is_a_warning() {
		let h = harness(false);
		materialize_metadata(&h.connection);
		let payer = h.orchestrator.wallet();
		h.connection.push_plan(StatusPlan::Land(Commitment::Confirmed));
		h.connection.push_plan(StatusPlan::Fail(0x1));

		let receipt = h
			.orchestrator
			.mint(MintRequest::new(sale(), false).with_post_transaction(vec![
				Instruction::new_with_bytes(
					Pubkey::new_unique(),
					&[7],
					vec![AccountMeta::new(payer, true)],
				),
			]))
			.await
			.unwrap();

		assert_eq!(receipt.warnings.len(), 1);
		assert_eq!(h.connection.send_count(), 2);
	}
}
