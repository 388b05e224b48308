//!
//! The sale sync loop and the handle callers talk to it through.
//!
//! The loop is the single writer of the published snapshot. It refreshes once at
//! startup, again on a fixed timer at `Confirmed`, and whenever a handle asks for it.
//! Every publication replaces the whole `SaleSnapshot`, so observers never see a view
//! assembled from two different reads.

use super::events::{EventDispatcher, SaleEvent, SaleEventHandler};
use super::progress_tracker::{RefreshStats, RefreshTracker};
use super::types::{SaleSnapshot, SyncCommand, SyncError};
use crate::chain::Commitment;
use crate::quota::{QuotaStatus, QuotaTracker};
use crate::sale::{OptimisticDelta, SaleError, SaleStateDeriver, SaleStateReader};

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Default period of the `Confirmed` refresh timer
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const COMMAND_CAPACITY: usize = 16;

type Published = Option<Arc<SaleSnapshot>>;

/// Cloneable handle to a running sync loop.
///
/// The loop stops once every handle has been dropped.
#[derive(Clone)]
pub struct SyncHandle {
	commands: mpsc::Sender<SyncCommand>,
	snapshots: watch::Receiver<Published>,
}

impl SyncHandle {
	/// Last published snapshot, `None` until the first refresh completes
	pub fn latest(&self) -> Option<Arc<SaleSnapshot>> {
		self.snapshots.borrow().clone()
	}

	/// Receiver notified on every publication
	pub fn subscribe(&self) -> watch::Receiver<Published> {
		self.snapshots.clone()
	}

	/// Ask the loop to refresh at `commitment`
	pub async fn refresh(&self, commitment: Commitment) -> Result<(), SyncError> {
		self.send(SyncCommand::Refresh(commitment)).await
	}

	/// Ask the loop to publish the last snapshot with `delta` applied
	pub async fn apply_optimistic(&self, delta: OptimisticDelta) -> Result<(), SyncError> {
		self.send(SyncCommand::ApplyOptimistic(delta)).await
	}

	async fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
		self.commands
			.send(command)
			.await
			.map_err(|_| SyncError::Stopped)
	}
}

/// Keeps the published sale snapshot current
pub struct SyncLoop {
	reader: SaleStateReader,
	deriver: SaleStateDeriver,
	quota: Option<Arc<QuotaTracker>>,
	sale: Pubkey,
	wallet: Pubkey,
	interval: Duration,
	dispatcher: EventDispatcher,
	tracker: RefreshTracker,
	publisher: watch::Sender<Published>,
	commands: mpsc::Receiver<SyncCommand>,
}

impl SyncLoop {
	/// Create the loop for `sale` as seen by `wallet`, together with its first handle.
	pub fn new(
		reader: SaleStateReader,
		deriver: SaleStateDeriver,
		sale: Pubkey,
		wallet: Pubkey,
	) -> (Self, SyncHandle) {
		let (publisher, snapshots) = watch::channel(None);
		let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);

		let sync_loop = Self {
			reader,
			deriver,
			quota: None,
			sale,
			wallet,
			interval: DEFAULT_REFRESH_INTERVAL,
			dispatcher: EventDispatcher::new(),
			tracker: RefreshTracker::default(),
			publisher,
			commands,
		};
		let handle = SyncHandle {
			commands: command_tx,
			snapshots,
		};
		(sync_loop, handle)
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Include the wallet's ledger count in every snapshot
	pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
		self.quota = Some(quota);
		self
	}

	pub fn register_handler(&mut self, handler: Box<dyn SaleEventHandler>) {
		self.dispatcher.register_handler(handler);
	}

	/// Run until every handle is dropped, returning the refresh statistics
	pub async fn run(mut self) -> RefreshStats {
		info!(
			"Starting sale sync for {} (wallet {}, every {:?})",
			self.sale, self.wallet, self.interval
		);
		self.refresh(Commitment::Confirmed).await;

		let mut timer = interval_at(Instant::now() + self.interval, self.interval);
		timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				command = self.commands.recv() => match command {
					Some(SyncCommand::Refresh(commitment)) => self.refresh(commitment).await,
					Some(SyncCommand::ApplyOptimistic(delta)) => self.apply_optimistic(delta).await,
					None => {
						info!("All sync handles dropped, stopping sale sync");
						break;
					}
				},
				_ = timer.tick() => self.refresh(Commitment::Confirmed).await,
			}
			self.tracker.log_progress(false);
		}

		self.tracker.log_progress(true);
		self.tracker.get_stats()
	}

	async fn refresh(&mut self, commitment: Commitment) {
		debug!("Refreshing sale {} at {}", self.sale, commitment);
		match self.load(commitment).await {
			Ok(snapshot) => {
				let snapshot = Arc::new(snapshot);
				self.tracker.record_success(commitment, &snapshot.view);
				self.publisher.send_replace(Some(snapshot.clone()));
				self.dispatcher
					.dispatch(&SaleEvent::ViewRefreshed { snapshot })
					.await;
			}
			Err(error) => {
				warn!("Refresh of sale {} at {} failed: {}", self.sale, commitment, error);
				self.tracker.record_failure(commitment);
				self.dispatcher
					.dispatch(&SaleEvent::RefreshFailed { commitment, error })
					.await;
			}
		}
	}

	/// Reader, deriver and quota tracker in sequence
	async fn load(&self, commitment: Commitment) -> Result<SaleSnapshot, SaleError> {
		let config = self.reader.fetch(&self.sale, commitment).await?;
		let auxiliary = self
			.reader
			.fetch_auxiliary(&config, &self.wallet, commitment)
			.await?;

		let derived_at = chrono::Utc::now().timestamp();
		let whitelist_balance = config
			.whitelist
			.as_ref()
			.map(|_| auxiliary.whitelist_balance);
		let view = self.deriver.derive(&config, derived_at, whitelist_balance);

		let quota = match &self.quota {
			Some(tracker) => Some(match tracker.current_count(&self.wallet).await {
				Ok(count) => QuotaStatus::Counted(count),
				Err(e) => {
					warn!("Quota ledger unreadable during refresh: {}", e);
					QuotaStatus::Unknown
				}
			}),
			None => None,
		};

		Ok(SaleSnapshot {
			config,
			auxiliary,
			view,
			quota,
			commitment,
			optimistic: false,
			derived_at,
		})
	}

	async fn apply_optimistic(&mut self, delta: OptimisticDelta) {
		let current = self.publisher.borrow().clone();
		let Some(current) = current else {
			warn!("No sale snapshot published yet, dropping optimistic update");
			return;
		};

		let snapshot = Arc::new(current.with_optimistic(&delta));
		info!(
			"Applied optimistic mint: {} remaining",
			snapshot.view.items_remaining
		);
		self.tracker.record_optimistic();
		self.publisher.send_replace(Some(snapshot.clone()));
		self.dispatcher
			.dispatch(&SaleEvent::OptimisticApplied { snapshot })
			.await;
	}
}
