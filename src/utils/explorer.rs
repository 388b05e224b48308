//! Cluster names and explorer links.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

/// Solana cluster the sale lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
	MainnetBeta,
	Devnet,
	Testnet,
}

impl FromStr for Cluster {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"mainnet" | "mainnet-beta" => Ok(Cluster::MainnetBeta),
			"devnet" => Ok(Cluster::Devnet),
			"testnet" => Ok(Cluster::Testnet),
			other => Err(format!("unknown cluster '{}'", other)),
		}
	}
}

impl fmt::Display for Cluster {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Cluster::MainnetBeta => write!(f, "mainnet-beta"),
			Cluster::Devnet => write!(f, "devnet"),
			Cluster::Testnet => write!(f, "testnet"),
		}
	}
}

/// Solscan page of a minted token
pub fn explorer_token_url(mint: &Pubkey, cluster: Cluster) -> String {
	match cluster {
		Cluster::MainnetBeta => format!("https://solscan.io/token/{}", mint),
		other => format!("https://solscan.io/token/{}?cluster={}", mint, other),
	}
}
