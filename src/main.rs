use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

use candy_mint_sync::chain::SolanaRpcConnection;
use candy_mint_sync::config::{Cli, Command};
use candy_mint_sync::sale::{SaleStateDeriver, SaleStateReader};
use candy_mint_sync::sync::{SyncLoop, ViewLogger};
use candy_mint_sync::transaction::{KeypairSigner, TransactionSigner};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("candy_mint_sync=debug".parse()?)
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let cli = Cli::parse();
	let signer = KeypairSigner::from_file(&cli.keypair)
		.with_context(|| format!("loading wallet keypair {}", cli.keypair.display()))?;
	let wallet = signer.pubkey();
	let quota = cli.quota_tracker().context("configuring the quota ledger")?;
	let budget = cli.budget().context("loading the transaction budget")?;
	let gate = cli
		.verification_gate()
		.context("configuring the gateway verifier")?;
	debug!(
		"Split limit {} bytes, confirmation deadline {:?}, verifier {}",
		budget.limit,
		cli.tx_timeout(),
		cli.verifier_url.as_deref().unwrap_or("none")
	);

	match cli.command {
		Command::Watch => {
			info!(
				"Watching sale {} on {} via {}",
				cli.candy_machine_id, cli.network, cli.rpc_host
			);
			let connection = Arc::new(SolanaRpcConnection::new(cli.rpc_host.clone()));
			let units = cli.payment_units();

			let (sync_loop, handle) = SyncLoop::new(
				SaleStateReader::new(connection),
				SaleStateDeriver::new(units.clone()),
				cli.candy_machine_id,
				wallet,
			);
			let mut sync_loop = sync_loop.with_interval(cli.refresh_interval());
			if let Some(quota) = quota {
				sync_loop = sync_loop.with_quota(quota);
			}
			sync_loop.register_handler(Box::new(ViewLogger::new(units)));

			let task = tokio::spawn(sync_loop.run());
			if gate.is_none() {
				let mut snapshots = handle.subscribe();
				tokio::spawn(async move {
					let needs_gate = match snapshots.wait_for(|snapshot| snapshot.is_some()).await {
						Ok(first) => first
							.as_ref()
							.is_some_and(|snapshot| snapshot.config.gatekeeper.is_some()),
						Err(_) => false,
					};
					if needs_gate {
						warn!("Sale requires gateway verification but GATEWAY_VERIFIER_URL is not set");
					}
				});
			}
			tokio::signal::ctrl_c()
				.await
				.context("waiting for Ctrl-C")?;
			info!("Shutting down");

			drop(handle);
			let stats = task.await.context("sync loop panicked")?;
			info!("{}", stats.summary());
		}
		Command::Quota => {
			let Some(quota) = quota else {
				bail!("QUOTA_LEDGER_URL is not set");
			};
			let count = quota
				.current_count(&wallet)
				.await
				.context("reading the quota ledger")?;
			println!("{} has minted {}/{}", wallet, count, quota.cap());
		}
	}

	Ok(())
}
