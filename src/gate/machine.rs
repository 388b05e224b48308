//!
//! Human-verification gate in front of the mint.
//!
//! The gate is an explicit state machine. `transition` is the whole transition table;
//! `VerificationGate` drives it from verifier responses and user cancellation.

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone)]
pub enum GateError {
	#[error("A verification challenge is already outstanding")]
	ChallengePending,

	#[error("Verification rejected: {0}")]
	Rejected(String),

	#[error("Verifier error: {0}")]
	Verifier(String),

	#[error("Invalid gateway instruction: {0}")]
	InvalidInstruction(String),
}

/// Status reported by the verification service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierStatus {
	Idle,
	/// The user is completing the challenge
	Collecting,
	/// Passed; the instruction proves it on chain
	Active(Instruction),
	Error(String),
}

/// Third-party verification service
#[async_trait]
pub trait GatewayVerifier: Send + Sync {
	async fn request_challenge(&self, wallet: &Pubkey, network: &Pubkey) -> Result<(), GateError>;

	async fn status(&self, wallet: &Pubkey, network: &Pubkey) -> Result<VerifierStatus, GateError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
	Idle,
	AwaitingChallenge,
	/// Holds the instruction attached to the next mint
	Verified(Instruction),
	Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
	ChallengeRequested,
	VerifierPassed(Instruction),
	VerifierFailed(String),
	Cancelled,
	/// The mint used a token that expires on use
	TokenConsumed,
}

/// Next state for `event`, or `None` when the event does not apply in `state`
pub fn transition(state: &GateState, event: GateEvent) -> Option<GateState> {
	match (state, event) {
		(GateState::Idle | GateState::Rejected(_), GateEvent::ChallengeRequested) => {
			Some(GateState::AwaitingChallenge)
		}
		(GateState::AwaitingChallenge, GateEvent::VerifierPassed(instruction)) => {
			Some(GateState::Verified(instruction))
		}
		(GateState::AwaitingChallenge, GateEvent::VerifierFailed(reason)) => {
			Some(GateState::Rejected(reason))
		}
		(GateState::AwaitingChallenge, GateEvent::Cancelled) => {
			Some(GateState::Rejected("cancelled by user".to_string()))
		}
		(GateState::Verified(_), GateEvent::TokenConsumed) => Some(GateState::Idle),
		_ => None,
	}
}

/// Verification gate for one wallet session
pub struct VerificationGate {
	verifier: Box<dyn GatewayVerifier>,
	state: Mutex<GateState>,
	poll_interval: Duration,
	/// Upper bound on waiting for the user to pass the challenge
	challenge_timeout: Duration,
}

impl VerificationGate {
	pub fn new(verifier: Box<dyn GatewayVerifier>) -> Self {
		Self {
			verifier,
			state: Mutex::new(GateState::Idle),
			poll_interval: Duration::from_secs(1),
			challenge_timeout: Duration::from_secs(300),
		}
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}

	pub fn with_challenge_timeout(mut self, challenge_timeout: Duration) -> Self {
		self.challenge_timeout = challenge_timeout;
		self
	}

	pub fn state(&self) -> GateState {
		self.lock_state().clone()
	}

	/// Apply `event`; returns whether the state changed
	pub fn apply(&self, event: GateEvent) -> bool {
		apply_to(&mut self.lock_state(), event)
	}

	/// Abort an outstanding challenge
	pub fn cancel(&self) -> bool {
		self.apply(GateEvent::Cancelled)
	}

	/// Mark the held token as spent by a mint
	pub fn consume(&self) -> bool {
		self.apply(GateEvent::TokenConsumed)
	}

	/// Obtain the gateway instruction for `wallet`, running the challenge if needed.
	///
	/// # Errors
	/// `ChallengePending` if a challenge is already outstanding (the call is a no-op),
	/// `Rejected` when the verifier fails, the user cancels or the challenge times out.
	pub async fn verify(&self, wallet: &Pubkey, network: &Pubkey) -> Result<Instruction, GateError> {
		{
			let mut state = self.lock_state();
			if let GateState::Verified(instruction) = &*state {
				return Ok(instruction.clone());
			}
			if !apply_to(&mut state, GateEvent::ChallengeRequested) {
				return Err(GateError::ChallengePending);
			}
		}

		if let Err(e) = self.verifier.request_challenge(wallet, network).await {
			self.apply(GateEvent::VerifierFailed(e.to_string()));
			return Err(self.rejection());
		}
		info!("Requested verification challenge for {} on {}", wallet, network);

		let deadline = Instant::now() + self.challenge_timeout;
		loop {
			if self.state() != GateState::AwaitingChallenge {
				return Err(self.rejection());
			}
			if Instant::now() >= deadline {
				self.apply(GateEvent::VerifierFailed(format!(
					"challenge not completed within {:?}",
					self.challenge_timeout
				)));
				return Err(self.rejection());
			}

			match self.verifier.status(wallet, network).await {
				Ok(VerifierStatus::Active(instruction)) => {
					self.apply(GateEvent::VerifierPassed(instruction));
					return match self.state() {
						GateState::Verified(instruction) => Ok(instruction),
						_ => Err(self.rejection()),
					};
				}
				Ok(VerifierStatus::Error(reason)) => {
					self.apply(GateEvent::VerifierFailed(reason));
					return Err(self.rejection());
				}
				Ok(VerifierStatus::Collecting) => {
					debug!("Verifier collecting user information for {}", wallet);
				}
				Ok(VerifierStatus::Idle) => {}
				Err(GateError::Verifier(e)) => warn!("Verifier status poll failed: {}", e),
				Err(e) => {
					self.apply(GateEvent::VerifierFailed(e.to_string()));
					return Err(self.rejection());
				}
			}
			sleep(self.poll_interval).await;
		}
	}

	fn rejection(&self) -> GateError {
		match self.state() {
			GateState::Rejected(reason) => GateError::Rejected(reason),
			other => GateError::Rejected(format!("verification ended in {:?}", other)),
		}
	}

	fn lock_state(&self) -> std::sync::MutexGuard<'_, GateState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

fn apply_to(state: &mut GateState, event: GateEvent) -> bool {
	let label = format!("{:?}", event);
	match transition(state, event) {
		Some(next) => {
			info!("Verification gate: {:?} -> {:?}", state, next);
			*state = next;
			true
		}
		None => {
			debug!("Verification gate ignored {} in {:?}", label, state);
			false
		}
	}
}


#[cfg(test)]
mod tests {
	use super::mock::ScriptedVerifier;
	use super::*;
	use solana_sdk::instruction::AccountMeta;
	use std::sync::Arc;

	fn gateway_instruction(wallet: &Pubkey) -> Instruction {
		Instruction::new_with_bytes(
			Pubkey::new_unique(),
			&[3],
			vec![AccountMeta::new_readonly(*wallet, true)],
		)
	}

	#[test]
	fn transition_table() {
		let ix = gateway_instruction(&Pubkey::new_unique());

		assert_eq!(
			transition(&GateState::Idle, GateEvent::ChallengeRequested),
			Some(GateState::AwaitingChallenge)
		);
		assert_eq!(
			transition(&GateState::AwaitingChallenge, GateEvent::ChallengeRequested),
			None
		);
		assert_eq!(
			transition(&GateState::AwaitingChallenge, GateEvent::VerifierPassed(ix.clone())),
			Some(GateState::Verified(ix.clone()))
		);
		assert!(matches!(
			transition(&GateState::AwaitingChallenge, GateEvent::Cancelled),
			Some(GateState::Rejected(_))
		));
		assert_eq!(
			transition(&GateState::Verified(ix.clone()), GateEvent::TokenConsumed),
			Some(GateState::Idle)
		);
		// a late verifier answer after cancellation does not revive the challenge
		assert_eq!(
			transition(&GateState::Rejected("cancelled".into()), GateEvent::VerifierPassed(ix)),
			None
		);
	}

	#[tokio::test(start_paused = true)]
	async fn passing_challenge_yields_the_instruction() {
		let wallet = Pubkey::new_unique();
		let ix = gateway_instruction(&wallet);
		let verifier = ScriptedVerifier::new([
			VerifierStatus::Idle,
			VerifierStatus::Collecting,
			VerifierStatus::Active(ix.clone()),
		]);
		let gate = VerificationGate::new(Box::new(verifier));

		let result = gate.verify(&wallet, &Pubkey::new_unique()).await.unwrap();
		assert_eq!(result, ix);
		assert_eq!(gate.state(), GateState::Verified(ix.clone()));

		// the held token is reused without a new challenge
		assert_eq!(gate.verify(&wallet, &Pubkey::new_unique()).await.unwrap(), ix);
	}

	#[tokio::test(start_paused = true)]
	async fn verifier_error_rejects() {
		let gate = VerificationGate::new(Box::new(ScriptedVerifier::new([VerifierStatus::Error(
			"captcha failed".to_string(),
		)])));

		let err = gate
			.verify(&Pubkey::new_unique(), &Pubkey::new_unique())
			.await
			.unwrap_err();
		assert!(matches!(err, GateError::Rejected(reason) if reason == "captcha failed"));
	}

	#[tokio::test(start_paused = true)]
	async fn second_request_while_awaiting_is_a_no_op() {
		let gate = Arc::new(VerificationGate::new(Box::new(ScriptedVerifier::new([
			VerifierStatus::Collecting,
		]))));
		let wallet = Pubkey::new_unique();
		let network = Pubkey::new_unique();

		let first = tokio::spawn({
			let gate = gate.clone();
			async move { gate.verify(&wallet, &network).await }
		});
		while gate.state() != GateState::AwaitingChallenge {
			tokio::task::yield_now().await;
		}

		let err = gate.verify(&wallet, &network).await.unwrap_err();
		assert!(matches!(err, GateError::ChallengePending));
		assert_eq!(gate.state(), GateState::AwaitingChallenge);

		assert!(gate.cancel());
		let err = first.await.unwrap().unwrap_err();
		assert!(matches!(err, GateError::Rejected(reason) if reason.contains("cancelled")));
	}

	#[tokio::test(start_paused = true)]
	async fn unanswered_challenge_times_out() {
		let gate = VerificationGate::new(Box::new(ScriptedVerifier::new([VerifierStatus::Collecting])))
			.with_challenge_timeout(Duration::from_secs(10));

		let started = Instant::now();
		let err = gate
			.verify(&Pubkey::new_unique(), &Pubkey::new_unique())
			.await
			.unwrap_err();
		assert!(matches!(err, GateError::Rejected(_)));
		assert!(started.elapsed() >= Duration::from_secs(10));
		assert!(matches!(gate.state(), GateState::Rejected(_)));
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_requests_start_a_single_challenge() {
		let verifier = Arc::new(ScriptedVerifier::new([VerifierStatus::Collecting]));
		let gate = VerificationGate::new(Box::new(SharedVerifier(verifier.clone())))
			.with_challenge_timeout(Duration::from_secs(5));
		let wallet = Pubkey::new_unique();
		let network = Pubkey::new_unique();

		let (a, b, c) = tokio::join!(
			gate.verify(&wallet, &network),
			gate.verify(&wallet, &network),
			gate.verify(&wallet, &network),
		);
		let pending = [&a, &b, &c]
			.iter()
			.filter(|r| matches!(r, Err(GateError::ChallengePending)))
			.count();

		assert_eq!(pending, 2);
		assert_eq!(verifier.challenges.load(std::sync::atomic::Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn malformed_instruction_rejects_without_waiting() {
		let gate = VerificationGate::new(Box::new(ScriptedVerifier::with_responses([
			Ok(VerifierStatus::Collecting),
			Err(GateError::InvalidInstruction("bad account key".to_string())),
		])));

		let started = Instant::now();
		let err = gate
			.verify(&Pubkey::new_unique(), &Pubkey::new_unique())
			.await
			.unwrap_err();

		assert!(matches!(err, GateError::Rejected(reason) if reason.contains("bad account key")));
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test(start_paused = true)]
	async fn transport_errors_keep_polling() {
		let wallet = Pubkey::new_unique();
		let ix = gateway_instruction(&wallet);
		let verifier = Arc::new(ScriptedVerifier::with_responses([
			Err(GateError::Verifier("503 Service Unavailable".to_string())),
			Err(GateError::Verifier("connection reset".to_string())),
			Ok(VerifierStatus::Active(ix.clone())),
		]));
		let gate = VerificationGate::new(Box::new(SharedVerifier(verifier.clone())));

		assert_eq!(gate.verify(&wallet, &Pubkey::new_unique()).await.unwrap(), ix);
		assert_eq!(verifier.polls.load(std::sync::atomic::Ordering::SeqCst), 3);
	}

	/// Lets a test keep a handle on the verifier the gate owns
	struct SharedVerifier(Arc<ScriptedVerifier>);

	#[async_trait]
	impl GatewayVerifier for SharedVerifier {
		async fn request_challenge(&self, wallet: &Pubkey, network: &Pubkey) -> Result<(), GateError> {
			self.0.request_challenge(wallet, network).await
		}

		async fn status(&self, wallet: &Pubkey, network: &Pubkey) -> Result<VerifierStatus, GateError> {
			self.0.status(wallet, network).await
		}
	}
}
