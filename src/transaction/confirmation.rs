//!
//! Confirmation polling for submitted transactions.
//!
//! Every wait is bounded by its timeout. A timeout means the network did not report the
//! transaction in time, not that it failed; it may still land afterwards.

use crate::chain::{Commitment, RpcConnection, TransactionFailure};

use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Delay between two status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result of waiting on a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
	/// Reached the target commitment without an execution error
	Confirmed(Commitment),
	/// Landed with an execution error, reported untouched
	Failed(TransactionFailure),
	/// Deadline elapsed before either of the above
	Timeout,
}

/// Polls signature statuses until a terminal outcome or the deadline
#[derive(Clone)]
pub struct ConfirmationWaiter {
	connection: Arc<dyn RpcConnection>,
	poll_interval: Duration,
}

impl ConfirmationWaiter {
	pub fn new(connection: Arc<dyn RpcConnection>) -> Self {
		Self {
			connection,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}

	/// Wait for `signature` to reach `confirmed` (strict) or `processed`.
	///
	/// Returns within `deadline` of the call in every case.
	pub async fn wait(&self, signature: &Signature, deadline: Duration, strict: bool) -> ConfirmationOutcome {
		let target = if strict {
			Commitment::Confirmed
		} else {
			Commitment::Processed
		};
		let started = Instant::now();

		match timeout(deadline, self.poll(signature, target)).await {
			Ok(outcome) => {
				info!(
					"Transaction {} resolved after {:?}: {:?}",
					signature,
					started.elapsed(),
					outcome
				);
				outcome
			}
			Err(_) => {
				warn!(
					"Timed out after {:?} waiting for {} to reach {}",
					deadline, signature, target
				);
				ConfirmationOutcome::Timeout
			}
		}
	}

	async fn poll(&self, signature: &Signature, target: Commitment) -> ConfirmationOutcome {
		let mut attempt: u32 = 0;
		loop {
			attempt += 1;
			match self.connection.get_signature_status(signature).await {
				Ok(Some(status)) => {
					if let Some(failure) = status.err {
						warn!("Transaction {} failed on chain: {}", signature, failure);
						return ConfirmationOutcome::Failed(failure);
					}
					if status.reached(target) {
						return ConfirmationOutcome::Confirmed(status.commitment);
					}
					debug!(
						"Transaction {} at {} (poll #{}), waiting for {}",
						signature, status.commitment, attempt, target
					);
				}
				Ok(None) => {
					debug!("Transaction {} not yet seen (poll #{})", signature, attempt);
				}
				Err(e) => {
					// polling continues until the deadline
					warn!("Status poll #{} for {} failed: {}", attempt, signature, e);
				}
			}
			sleep(self.poll_interval).await;
		}
	}
}
