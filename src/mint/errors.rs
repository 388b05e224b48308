//! Error taxonomy reported for a mint request.

use crate::chain::TransactionFailure;
use crate::gate::GateError;
use crate::quota::QuotaError;
use crate::sale::SaleError;
use crate::transaction::{SignerError, TransactionError};

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;
use thiserror::Error;

/// Sale program error: the sale is sold out
pub const ERROR_SOLD_OUT: u32 = 0x137;
/// Sale program error: the sale has not started
pub const ERROR_NOT_STARTED: u32 = 0x138;
/// Sale program errors raised when the payer cannot cover the price
pub const ERROR_NOT_ENOUGH_TOKENS: u32 = 0x135;
pub const ERROR_NOT_ENOUGH_SOL: u32 = 0x134;

/// Why the sale program refused a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectionCause {
	SoldOut,
	NotStarted,
	InsufficientFunds,
	/// Any other failure, reported as the network gave it
	Program { code: Option<u32>, message: String },
}

impl RejectionCause {
	/// Classify an on-chain failure.
	///
	/// The numeric code wins; messages that only carry the hex code are matched as a fallback.
	pub fn classify(failure: &TransactionFailure) -> Self {
		let code = failure.code.or_else(|| {
			[
				ERROR_SOLD_OUT,
				ERROR_NOT_STARTED,
				ERROR_NOT_ENOUGH_TOKENS,
				ERROR_NOT_ENOUGH_SOL,
			]
			.into_iter()
			.find(|code| failure.message.contains(&format!("{:#x}", code)))
		});

		match code {
			Some(ERROR_SOLD_OUT) => RejectionCause::SoldOut,
			Some(ERROR_NOT_STARTED) => RejectionCause::NotStarted,
			Some(ERROR_NOT_ENOUGH_TOKENS) | Some(ERROR_NOT_ENOUGH_SOL) => {
				RejectionCause::InsufficientFunds
			}
			_ => RejectionCause::Program {
				code: failure.code,
				message: failure.message.clone(),
			},
		}
	}
}

impl fmt::Display for RejectionCause {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RejectionCause::SoldOut => write!(f, "sold out"),
			RejectionCause::NotStarted => write!(f, "minting period hasn't started yet"),
			RejectionCause::InsufficientFunds => {
				write!(f, "insufficient funds to mint, please fund your wallet")
			}
			RejectionCause::Program {
				code: Some(code),
				message,
			} => write!(f, "{} (custom program error: {:#x})", message, code),
			RejectionCause::Program {
				code: None,
				message,
			} => write!(f, "{}", message),
		}
	}
}

/// Outcome kinds of a failed mint request
#[derive(Error, Debug, Clone)]
pub enum MintError {
	#[error("Sale account {0} is not configured")]
	ConfigNotFound(Pubkey),

	#[error("RPC unavailable: {0}")]
	RpcUnavailable(String),

	#[error("Account setup failed: {0}")]
	SetupFailed(String),

	#[error("Mint rejected: {0}")]
	MintRejected(RejectionCause),

	/// Submitted but not confirmed; funds may have moved
	#[error("Mint likely failed, check the explorer before retrying: {reason}")]
	MintAmbiguous {
		signature: Option<Signature>,
		reason: String,
	},

	#[error("Quota ledger unavailable: {0}")]
	LedgerUnavailable(String),

	#[error("Mint quota reached ({count}/{cap})")]
	QuotaExceeded { count: u32, cap: u32 },

	#[error("A mint is already in progress")]
	MintInProgress,

	#[error("Sale is not open: {0}")]
	SaleNotReady(String),

	#[error("Verification in progress")]
	VerificationPending,

	#[error("Verification rejected: {0}")]
	VerificationRejected(String),

	#[error("Signing failed: {0}")]
	Signing(#[from] SignerError),

	#[error("Transaction could not be built: {0}")]
	Build(#[from] TransactionError),
}

impl MintError {
	/// Whether the same request may succeed if the user simply tries again later
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			MintError::RpcUnavailable(_)
				| MintError::SetupFailed(_)
				| MintError::LedgerUnavailable(_)
				| MintError::MintInProgress
				| MintError::VerificationPending
				| MintError::VerificationRejected(_)
				| MintError::Signing(_)
		)
	}
}

impl From<SaleError> for MintError {
	fn from(err: SaleError) -> Self {
		match err {
			SaleError::ConfigNotFound(address) => MintError::ConfigNotFound(address),
			SaleError::RpcUnavailable(msg) => MintError::RpcUnavailable(msg),
			SaleError::InvalidAccount(msg) => MintError::SaleNotReady(msg),
		}
	}
}

impl From<QuotaError> for MintError {
	fn from(err: QuotaError) -> Self {
		match err {
			QuotaError::Exceeded { count, cap } => MintError::QuotaExceeded { count, cap },
			other => MintError::LedgerUnavailable(other.to_string()),
		}
	}
}

impl From<GateError> for MintError {
	fn from(err: GateError) -> Self {
		match err {
			GateError::ChallengePending => MintError::VerificationPending,
			GateError::Rejected(reason) => MintError::VerificationRejected(reason),
			other => MintError::VerificationRejected(other.to_string()),
		}
	}
}
