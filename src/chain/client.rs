//!
//! Connection collaborator for the Solana cluster.
//!
//! This module defines the `RpcConnection` trait the engine talks to, and an async
//! implementation backed by the Solana JSON-RPC client. The trait is deliberately narrow:
//! account reads, balances, blockhash, raw submission and signature status.

use super::types::*;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Network access used by every component of the engine
#[async_trait]
pub trait RpcConnection: Send + Sync {
	/// Fetch the raw data of an account, `None` if it does not exist
	async fn get_account_info(
		&self,
		address: &Pubkey,
		commitment: Commitment,
	) -> Result<Option<Vec<u8>>, ChainError>;

	/// Native balance of an account in lamports
	async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError>;

	/// Raw token amount held by a token account
	async fn get_token_account_balance(&self, address: &Pubkey) -> Result<u64, ChainError>;

	/// Blockhash to build new transactions against
	async fn get_latest_blockhash(&self) -> Result<Hash, ChainError>;

	/// Submit a serialized, signed transaction
	async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainError>;

	/// Current status of a submitted transaction, `None` if the network has not seen it
	async fn get_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError>;
}

/// Solana JSON-RPC connection
#[derive(Clone)]
pub struct SolanaRpcConnection {
	/// The underlying nonblocking RPC client.
	client: Arc<RpcClient>,
	/// The RPC endpoint, kept for log messages.
	rpc_url: String,
}

impl SolanaRpcConnection {
	/// Create a new connection.
	///
	/// # Arguments
	/// * `rpc_url` - The HTTP endpoint of the RPC node.
	///
	/// Reads default to `confirmed`; callers pass an explicit level where it matters.
	pub fn new(rpc_url: String) -> Self {
		let client = RpcClient::new_with_commitment(
			rpc_url.clone(),
			Commitment::Confirmed.to_config(),
		);
		info!("Created RPC connection to {}", rpc_url);

		Self {
			client: Arc::new(client),
			rpc_url,
		}
	}

	pub fn rpc_url(&self) -> &str {
		&self.rpc_url
	}
}

fn unavailable(e: ClientError) -> ChainError {
	ChainError::RpcUnavailable(e.to_string())
}

#[async_trait]
impl RpcConnection for SolanaRpcConnection {
	async fn get_account_info(
		&self,
		address: &Pubkey,
		commitment: Commitment,
	) -> Result<Option<Vec<u8>>, ChainError> {
		let response = self
			.client
			.get_account_with_commitment(address, commitment.to_config())
			.await
			.map_err(unavailable)?;

		debug!(
			"Account {} at {}: {}",
			address,
			commitment,
			if response.value.is_some() {
				"present"
			} else {
				"absent"
			}
		);
		Ok(response.value.map(|account| account.data))
	}

	async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
		self.client.get_balance(address).await.map_err(unavailable)
	}

	async fn get_token_account_balance(&self, address: &Pubkey) -> Result<u64, ChainError> {
		let amount = self
			.client
			.get_token_account_balance(address)
			.await
			.map_err(unavailable)?;

		amount.amount.parse::<u64>().map_err(|e| {
			ChainError::Serialization(format!(
				"Invalid token amount '{}' for {}: {}",
				amount.amount, address, e
			))
		})
	}

	async fn get_latest_blockhash(&self) -> Result<Hash, ChainError> {
		self.client.get_latest_blockhash().await.map_err(unavailable)
	}

	async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainError> {
		let params = json!([
			STANDARD.encode(bytes),
			{
				"encoding": "base64",
				"skipPreflight": false,
				"preflightCommitment": "processed"
			}
		]);

		let signature: String = self
			.client
			.send(RpcRequest::SendTransaction, params)
			.await
			.map_err(|e| match e.get_transaction_error() {
				Some(tx_err) => ChainError::TransactionRejected(TransactionFailure::from(&tx_err)),
				None => unavailable(e),
			})?;

		debug!("Submitted transaction {}", signature);
		Signature::from_str(&signature).map_err(|e| {
			ChainError::Serialization(format!("Invalid signature '{}': {}", signature, e))
		})
	}

	async fn get_signature_status(
		&self,
		signature: &Signature,
	) -> Result<Option<SignatureStatus>, ChainError> {
		let response = self
			.client
			.get_signature_statuses(&[*signature])
			.await
			.map_err(unavailable)?;

		let status = match response.value.into_iter().next().flatten() {
			Some(status) => status,
			None => return Ok(None),
		};

		let commitment = if status.satisfies_commitment(Commitment::Finalized.to_config()) {
			Commitment::Finalized
		} else if status.satisfies_commitment(Commitment::Confirmed.to_config()) {
			Commitment::Confirmed
		} else {
			Commitment::Processed
		};

		Ok(Some(SignatureStatus {
			commitment,
			err: status.err.as_ref().map(TransactionFailure::from),
		}))
	}
}
