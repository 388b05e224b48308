use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Claims signed into the ledger token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaClaims {
	/// Wallet address, base58
	pub public_key: String,
	/// Public network origin of the caller
	pub ip_address: String,
	#[serde(rename = "tokenCount")]
	pub mint_count: u32,
}

/// Ledger entry for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
	#[serde(default, alias = "publicKey")]
	pub identity: Option<String>,
	#[serde(alias = "tokenCount")]
	pub mint_count: u32,
}

/// What to do when the ledger cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerPolicy {
	/// Refuse to mint while the count is unknown
	#[default]
	FailClosed,
	/// Allow the mint with an unknown count
	FailOpen,
}

impl FromStr for LedgerPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"fail-closed" => Ok(LedgerPolicy::FailClosed),
			"fail-open" => Ok(LedgerPolicy::FailOpen),
			other => Err(format!(
				"unknown ledger policy '{}', expected fail-closed or fail-open",
				other
			)),
		}
	}
}

impl fmt::Display for LedgerPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LedgerPolicy::FailClosed => write!(f, "fail-closed"),
			LedgerPolicy::FailOpen => write!(f, "fail-open"),
		}
	}
}

/// Mint count known for an identity before a mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
	Counted(u32),
	/// Ledger unreachable and the policy let the mint through
	Unknown,
}

/// Error types for the quota ledger
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuotaError {
	#[error("Quota ledger unavailable: {0}")]
	LedgerUnavailable(String),

	#[error("Network origin unavailable: {0}")]
	OriginUnavailable(String),

	#[error("Invalid ledger response: {0}")]
	InvalidResponse(String),

	#[error("Failed to sign ledger token: {0}")]
	Token(String),

	#[error("Mint quota reached ({count}/{cap})")]
	Exceeded { count: u32, cap: u32 },
}

impl From<reqwest::Error> for QuotaError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			QuotaError::InvalidResponse(err.to_string())
		} else {
			QuotaError::LedgerUnavailable(err.to_string())
		}
	}
}
