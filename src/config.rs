//! Command line and environment configuration.

use crate::chain::RpcConnection;
use crate::gate::{GateError, HttpGatewayVerifier, VerificationGate};
use crate::mint::{MintInstructionBuilder, MintOrchestrator};
use crate::quota::{HttpOriginResolver, HttpQuotaLedger, LedgerPolicy, QuotaError, QuotaTracker};
use crate::sale::PaymentUnits;
use crate::transaction::{TransactionBudget, TransactionSigner};
use crate::utils::{Cluster, NATIVE_DECIMALS};

use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Invalid transaction budget in {path}: {source}")]
	Budget {
		path: PathBuf,
		source: serde_json::Error,
	},

	#[error("Quota ledger URL is set but QUOTA_LEDGER_SECRET is missing")]
	MissingLedgerSecret,

	#[error(transparent)]
	Quota(#[from] QuotaError),

	#[error(transparent)]
	Gate(#[from] GateError),
}

#[derive(Parser, Debug)]
#[command(name = "candy-mint-sync")]
#[command(about = "Sale state sync and mint engine for candy machine sales")]
pub struct Cli {
	/// RPC endpoint of the Solana cluster
	#[arg(long, env = "SOLANA_RPC_HOST", default_value = "https://api.devnet.solana.com")]
	pub rpc_host: String,

	/// Address of the sale account
	#[arg(long, env = "CANDY_MACHINE_ID")]
	pub candy_machine_id: Pubkey,

	/// Cluster name, used for explorer links
	#[arg(long, env = "SOLANA_NETWORK", default_value = "devnet")]
	pub network: Cluster,

	/// Deadline for each transaction confirmation, in milliseconds
	#[arg(long, env = "TX_TIMEOUT_MS", default_value_t = 30_000)]
	pub tx_timeout_ms: u64,

	/// Period of the confirmed refresh, in seconds
	#[arg(long, env = "REFRESH_INTERVAL_SECS", default_value_t = 10)]
	pub refresh_interval_secs: u64,

	/// Wallet keypair file
	#[arg(long, env = "WALLET_KEYPAIR")]
	pub keypair: PathBuf,

	/// Symbol shown for sales paid in a token
	#[arg(long, env = "SPL_TOKEN_TO_MINT_NAME", default_value = "TOKEN")]
	pub token_symbol: String,

	#[arg(long, env = "SPL_TOKEN_TO_MINT_DECIMALS", default_value_t = 9)]
	pub token_decimals: u32,

	/// Base URL of the mint quota ledger; quota checks are skipped when unset
	#[arg(long, env = "QUOTA_LEDGER_URL")]
	pub quota_ledger_url: Option<String>,

	/// Shared secret the ledger verifies request tokens with
	#[arg(long, env = "QUOTA_LEDGER_SECRET", hide_env_values = true)]
	pub quota_ledger_secret: Option<String>,

	/// Mints allowed per wallet
	#[arg(long, env = "QUOTA_CAP", default_value_t = 5)]
	pub quota_cap: u32,

	/// What to do when the ledger cannot be read: fail-closed or fail-open
	#[arg(long, env = "LEDGER_POLICY", default_value = "fail-closed")]
	pub ledger_policy: LedgerPolicy,

	/// Echo service returning the caller's public address as `{ "ip": ... }`
	#[arg(long, env = "ORIGIN_LOOKUP_URL", default_value = "https://api.ipify.org?format=json")]
	pub origin_url: String,

	/// Gateway verification service, required for sales with a gatekeeper
	#[arg(long, env = "GATEWAY_VERIFIER_URL")]
	pub verifier_url: Option<String>,

	/// JSON file overriding the transaction split budget
	#[arg(long, env = "TRANSACTION_BUDGET_FILE")]
	pub budget_file: Option<PathBuf>,

	/// Override only the single-transaction byte limit of the split budget
	#[arg(long, env = "SPLIT_BYTE_LIMIT")]
	pub split_byte_limit: Option<usize>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Keep the sale view current and log every change
	Watch,
	/// Print the wallet's mint count from the quota ledger
	Quota,
}

impl Cli {
	pub fn tx_timeout(&self) -> Duration {
		Duration::from_millis(self.tx_timeout_ms)
	}

	pub fn refresh_interval(&self) -> Duration {
		Duration::from_secs(self.refresh_interval_secs)
	}

	pub fn payment_units(&self) -> PaymentUnits {
		PaymentUnits {
			native_symbol: "SOL".to_string(),
			native_decimals: NATIVE_DECIMALS,
			token_symbol: self.token_symbol.clone(),
			token_decimals: self.token_decimals,
		}
	}

	/// Split budget from the defaults, the budget file and the limit override, in that order
	pub fn budget(&self) -> Result<TransactionBudget, ConfigError> {
		let mut budget = match &self.budget_file {
			Some(path) => {
				let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
					path: path.clone(),
					source,
				})?;
				serde_json::from_str(&raw).map_err(|source| ConfigError::Budget {
					path: path.clone(),
					source,
				})?
			}
			None => TransactionBudget::default(),
		};
		if let Some(limit) = self.split_byte_limit {
			budget.limit = limit;
		}
		Ok(budget)
	}

	/// Quota tracker over the HTTP ledger, `None` when no ledger is configured
	pub fn quota_tracker(&self) -> Result<Option<Arc<QuotaTracker>>, ConfigError> {
		let Some(url) = &self.quota_ledger_url else {
			return Ok(None);
		};
		let secret = self
			.quota_ledger_secret
			.as_ref()
			.ok_or(ConfigError::MissingLedgerSecret)?;

		let ledger = HttpQuotaLedger::new(url.clone(), secret.as_bytes())?;
		let origin = HttpOriginResolver::new(self.origin_url.clone())?;
		let tracker = QuotaTracker::new(Arc::new(ledger), Arc::new(origin))
			.with_cap(self.quota_cap)
			.with_policy(self.ledger_policy);
		Ok(Some(Arc::new(tracker)))
	}

	/// Orchestrator using the configured split budget, confirmation deadline and cluster
	pub fn mint_orchestrator(
		&self,
		connection: Arc<dyn RpcConnection>,
		signer: Arc<dyn TransactionSigner>,
		instructions: Arc<dyn MintInstructionBuilder>,
	) -> Result<MintOrchestrator, ConfigError> {
		Ok(MintOrchestrator::new(connection, signer, instructions)
			.with_budget(self.budget()?)
			.with_timeout(self.tx_timeout())
			.with_cluster(self.network))
	}

	/// Gate over the HTTP verifier, `None` when no verifier is configured
	pub fn verification_gate(&self) -> Result<Option<Arc<VerificationGate>>, ConfigError> {
		let Some(url) = &self.verifier_url else {
			return Ok(None);
		};
		let verifier = HttpGatewayVerifier::new(url.clone())?;
		Ok(Some(Arc::new(VerificationGate::new(Box::new(verifier)))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::Commitment;
	use crate::chain::mock::{MockConnection, StatusPlan};
	use crate::gate::GateState;
	use crate::mint::instructions::stub::StubInstructions;
	use crate::mint::{AttemptOutcome, MintError, MintRequest};
	use crate::sale::SaleConfig;
	use crate::sale::account::metadata_address;
	use crate::transaction::KeypairSigner;
	use solana_sdk::signature::Keypair;

	const SALE: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

	fn parse(extra: &[&str]) -> Cli {
		let mut args = vec![
			"candy-mint-sync",
			"--candy-machine-id",
			SALE,
			"--keypair",
			"/tmp/id.json",
		];
		args.extend_from_slice(extra);
		Cli::try_parse_from(args).unwrap()
	}

	#[test]
	fn defaults_follow_the_client_settings() {
		let cli = parse(&["watch"]);

		assert_eq!(cli.command, Command::Watch);
		assert_eq!(cli.candy_machine_id.to_string(), SALE);
		assert_eq!(cli.network, Cluster::Devnet);
		assert_eq!(cli.tx_timeout(), Duration::from_secs(30));
		assert_eq!(cli.quota_cap, 5);
		assert_eq!(cli.ledger_policy, LedgerPolicy::FailClosed);
		assert_eq!(cli.payment_units().token_symbol, "TOKEN");
		assert_eq!(cli.budget().unwrap(), TransactionBudget::default());
		assert!(cli.quota_tracker().unwrap().is_none());
	}

	#[test]
	fn budget_limit_can_be_overridden() {
		let cli = parse(&["--split-byte-limit", "900", "--network", "mainnet-beta", "quota"]);

		assert_eq!(cli.command, Command::Quota);
		assert_eq!(cli.network, Cluster::MainnetBeta);
		assert_eq!(
			cli.budget().unwrap(),
			TransactionBudget {
				limit: 900,
				..TransactionBudget::default()
			}
		);
	}

	#[test]
	fn ledger_without_secret_is_rejected() {
		let cli = parse(&["--quota-ledger-url", "http://tracker.local", "quota"]);
		assert!(matches!(
			cli.quota_tracker(),
			Err(ConfigError::MissingLedgerSecret)
		));

		let cli = parse(&[
			"--quota-ledger-url",
			"http://tracker.local",
			"--quota-ledger-secret",
			"s3cret",
			"--ledger-policy",
			"fail-open",
			"quota",
		]);
		let tracker = cli.quota_tracker().unwrap().unwrap();
		assert_eq!(tracker.cap(), 5);
	}

	#[test]
	fn unknown_policy_fails_to_parse() {
		let result = Cli::try_parse_from([
			"candy-mint-sync",
			"--candy-machine-id",
			SALE,
			"--keypair",
			"/tmp/id.json",
			"--ledger-policy",
			"maybe",
			"watch",
		]);
		assert!(result.is_err());
	}

	fn sale() -> SaleConfig {
		SaleConfig {
			address: Pubkey::new_unique(),
			authority: Pubkey::new_unique(),
			treasury: Pubkey::new_unique(),
			items_available: 100,
			items_redeemed: 10,
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

	fn orchestrator(cli: &Cli, connection: &Arc<MockConnection>) -> MintOrchestrator {
		cli.mint_orchestrator(
			connection.clone(),
			Arc::new(KeypairSigner::new(Keypair::new())),
			Arc::new(StubInstructions::default()),
		)
		.unwrap()
	}

	#[tokio::test(start_paused = true)]
	async fn orchestrator_follows_the_configured_budget_and_cluster() {
		let connection = Arc::new(MockConnection::new());
		connection.on_land(|transaction| {
			transaction
				.message
				.account_keys
				.iter()
				.map(metadata_address)
				.collect()
		});

		let cli = parse(&["--split-byte-limit", "0", "watch"]);
		let receipt = orchestrator(&cli, &connection)
			.mint(MintRequest::new(sale(), true))
			.await
			.unwrap();

		// setup travels in its own transaction ahead of the mint
		assert_eq!(connection.send_count(), 2);
		assert_eq!(receipt.commitment, Commitment::Confirmed);
		assert!(receipt.explorer_url.ends_with("?cluster=devnet"));
	}

	#[tokio::test(start_paused = true)]
	async fn orchestrator_waits_for_the_configured_timeout() {
		let connection = Arc::new(MockConnection::new());
		connection.push_plan(StatusPlan::Vanish);

		let cli = parse(&["--tx-timeout-ms", "2000", "watch"]);
		let started = tokio::time::Instant::now();
		let failure = orchestrator(&cli, &connection)
			.mint(MintRequest::new(sale(), false))
			.await
			.unwrap_err();

		assert!(matches!(failure.error, MintError::MintAmbiguous { .. }));
		assert_eq!(failure.attempt.outcome, AttemptOutcome::Timeout);
		assert!(started.elapsed() >= Duration::from_secs(2));
		assert!(started.elapsed() < Duration::from_secs(30));
	}

	#[test]
	fn unreadable_budget_file_fails_the_orchestrator() {
		let cli = parse(&["--budget-file", "/nonexistent/budget.json", "watch"]);
		let result = cli.mint_orchestrator(
			Arc::new(MockConnection::new()),
			Arc::new(KeypairSigner::new(Keypair::new())),
			Arc::new(StubInstructions::default()),
		);
		assert!(matches!(result, Err(ConfigError::Read { .. })));
	}

	#[test]
	fn verification_gate_follows_the_verifier_url() {
		assert!(parse(&["watch"]).verification_gate().unwrap().is_none());

		let cli = parse(&["--verifier-url", "https://verify.example/", "watch"]);
		let gate = cli.verification_gate().unwrap().unwrap();
		assert_eq!(gate.state(), GateState::Idle);
	}
}
