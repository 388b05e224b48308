//!
//! A wallet's mint session.
//!
//! The session admits one mint request at a time. It checks the quota ledger, takes a
//! private copy of the last published sale snapshot, runs the verification gate when the
//! sale requires it, and hands the attempt to the orchestrator. Afterwards it reports back
//! to the ledger and the sync loop.

use super::errors::MintError;
use super::orchestrator::{MintOrchestrator, MintReceipt, MintRequest, SetupState};
use crate::chain::Commitment;
use crate::gate::VerificationGate;
use crate::quota::{QuotaStatus, QuotaTracker};
use crate::sale::{OptimisticDelta, SaleView};
use crate::sync::{SaleSnapshot, SyncHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Lamports a mint spends on rent and fees on top of the price
pub const MINT_FEE_ESTIMATE: u64 = 12_000_000;

/// Clears the in-flight flag when the attempt ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| InFlight(flag))
	}
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// Mint entry point for one wallet
pub struct MintSession {
	orchestrator: MintOrchestrator,
	sync: SyncHandle,
	quota: Option<Arc<QuotaTracker>>,
	gate: Option<Arc<VerificationGate>>,
	in_flight: AtomicBool,
	/// Setup confirmed by an attempt whose mint never executed
	pending_setup: Mutex<Option<SetupState>>,
}

impl MintSession {
	pub fn new(orchestrator: MintOrchestrator, sync: SyncHandle) -> Self {
		Self {
			orchestrator,
			sync,
			quota: None,
			gate: None,
			in_flight: AtomicBool::new(false),
			pending_setup: Mutex::new(None),
		}
	}

	pub fn with_quota(mut self, quota: Arc<QuotaTracker>) -> Self {
		self.quota = Some(quota);
		self
	}

	pub fn with_gate(mut self, gate: Arc<VerificationGate>) -> Self {
		self.gate = Some(gate);
		self
	}

	pub fn is_minting(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Abort an outstanding verification challenge
	pub fn cancel_verification(&self) -> bool {
		self.gate.as_ref().is_some_and(|gate| gate.cancel())
	}

	/// Mint one token for the session's wallet.
	///
	/// # Errors
	/// `MintInProgress` while another request runs, `SaleNotReady` when no snapshot has
	/// been published or the sale is not open, `QuotaExceeded`/`LedgerUnavailable` from the
	/// ledger check, verification errors from the gate, and every orchestrator outcome.
	pub async fn mint(&self) -> Result<MintReceipt, MintError> {
		let _guard = InFlight::acquire(&self.in_flight).ok_or(MintError::MintInProgress)?;
		let wallet = self.orchestrator.wallet();

		let snapshot = self
			.sync
			.latest()
			.ok_or_else(|| MintError::SaleNotReady("sale state not loaded yet".to_string()))?;

		let quota_status = match &self.quota {
			Some(quota) => Some(quota.check_eligible(&wallet).await?),
			None => None,
		};

		if !snapshot.view.is_active {
			return Err(MintError::SaleNotReady(not_ready_reason(&snapshot.view)));
		}

		let config = snapshot.config.clone();
		let mut request = MintRequest::new(config.clone(), snapshot.auxiliary.collection_present);

		if let Some(gatekeeper) = &config.gatekeeper {
			let gate = self.gate.as_ref().ok_or_else(|| {
				MintError::VerificationRejected(
					"sale requires verification but no verifier is configured".to_string(),
				)
			})?;
			let instruction = gate.verify(&wallet, &gatekeeper.network).await?;
			request = request.with_pre_transaction(vec![instruction]);
		}

		request = request.with_prior_setup(self.take_pending_setup());
		info!("Minting from sale {} for {}", config.address, wallet);

		let result = match self.orchestrator.mint(request).await {
			Ok(receipt) => {
				self.on_success(&snapshot, quota_status).await;
				Ok(receipt)
			}
			Err(failure) => {
				if let Some(setup) = failure.reusable_setup() {
					info!("Keeping confirmed setup {} for the next attempt", setup.signature);
					*self.lock_pending_setup() = Some(setup);
				}
				Err(failure.error)
			}
		};

		if let Err(e) = self.sync.refresh(Commitment::Processed).await {
			warn!("Could not request refresh after mint attempt: {}", e);
		}
		result
	}

	async fn on_success(&self, snapshot: &SaleSnapshot, quota_status: Option<QuotaStatus>) {
		let wallet = self.orchestrator.wallet();

		if let (Some(quota), Some(QuotaStatus::Counted(count))) = (&self.quota, quota_status) {
			if let Err(e) = quota.record_mint(&wallet, count + 1).await {
				warn!("Mint succeeded but the ledger was not updated: {}", e);
			}
		}

		if let Err(e) = self.sync.apply_optimistic(optimistic_delta(snapshot)).await {
			warn!("Could not publish optimistic view: {}", e);
		}

		if let (Some(gate), Some(gatekeeper)) = (&self.gate, &snapshot.config.gatekeeper) {
			if gatekeeper.expire_on_use {
				gate.consume();
			}
		}
	}

	fn take_pending_setup(&self) -> Option<SetupState> {
		self.lock_pending_setup().take()
	}

	fn lock_pending_setup(&self) -> std::sync::MutexGuard<'_, Option<SetupState>> {
		self.pending_setup
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Local effect of one confirmed mint on the snapshot it was taken from
pub fn optimistic_delta(snapshot: &SaleSnapshot) -> OptimisticDelta {
	let config = &snapshot.config;
	let whitelist_burned = u64::from(
		config.burns_whitelist_token() && snapshot.auxiliary.whitelist_balance > 0,
	);
	let lamports_spent = match config.token_mint {
		None => snapshot.view.price.saturating_add(MINT_FEE_ESTIMATE),
		Some(_) => MINT_FEE_ESTIMATE,
	};

	OptimisticDelta {
		minted: 1,
		whitelist_burned,
		lamports_spent,
	}
}

fn not_ready_reason(view: &SaleView) -> String {
	if view.is_sold_out {
		"sold out".to_string()
	} else if view.is_ended {
		"sale has ended".to_string()
	} else if view.is_presale || view.is_whitelist_only {
		"whitelist token required".to_string()
	} else {
		"minting period hasn't started yet".to_string()
	}
}
