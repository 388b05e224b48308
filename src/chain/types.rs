//! Types shared by the connection collaborator and its callers

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;
use std::fmt;

/// Consistency level a read or a confirmation is evaluated at.
///
/// Ordered from weakest to strongest so that "reached at least X" can be checked with `>=`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
	/// Seen by the connected node, may still be rolled back
	Processed,
	/// Voted on by a supermajority of the cluster
	Confirmed,
	/// Rooted, will not be rolled back
	Finalized,
}

impl Commitment {
	/// Convert to the RPC client's commitment configuration
	pub fn to_config(self) -> CommitmentConfig {
		match self {
			Commitment::Processed => CommitmentConfig::processed(),
			Commitment::Confirmed => CommitmentConfig::confirmed(),
			Commitment::Finalized => CommitmentConfig::finalized(),
		}
	}
}

impl fmt::Display for Commitment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Commitment::Processed => write!(f, "processed"),
			Commitment::Confirmed => write!(f, "confirmed"),
			Commitment::Finalized => write!(f, "finalized"),
		}
	}
}

/// On-chain execution failure reported for a transaction.
///
/// The raw code and message are kept untouched so the mint layer can classify them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFailure {
	/// Custom program error code, when the failure came from a program instruction
	pub code: Option<u32>,
	/// Human-readable error as reported by the network
	pub message: String,
}

impl TransactionFailure {
	pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}
}

impl From<&TransactionError> for TransactionFailure {
	fn from(err: &TransactionError) -> Self {
		let code = match err {
			TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
			_ => None,
		};
		Self {
			code,
			message: err.to_string(),
		}
	}
}

impl fmt::Display for TransactionFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.code {
			Some(code) => write!(f, "{} (custom program error: {:#x})", self.message, code),
			None => write!(f, "{}", self.message),
		}
	}
}

/// Status of a submitted transaction as last reported by the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
	/// Highest commitment level the transaction has reached
	pub commitment: Commitment,
	/// Execution error, if the transaction landed but failed
	pub err: Option<TransactionFailure>,
}

impl SignatureStatus {
	/// Check whether the status satisfies the given target commitment
	pub fn reached(&self, target: Commitment) -> bool {
		self.commitment >= target
	}
}

/// Error types for the connection collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
	#[error("RPC unavailable: {0}")]
	RpcUnavailable(String),

	#[error("Transaction rejected: {0}")]
	TransactionRejected(TransactionFailure),

	#[error("Serialization error: {0}")]
	Serialization(String),
}
