//! HTTP client for the gateway verification service.

use super::machine::{GateError, GatewayVerifier, VerifierStatus};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountMetaPayload {
	pubkey: String,
	is_signer: bool,
	is_writable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionPayload {
	program_id: String,
	accounts: Vec<AccountMetaPayload>,
	data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum StatusKind {
	Idle,
	Collecting,
	Active,
	Error,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
	status: StatusKind,
	#[serde(default)]
	instruction: Option<InstructionPayload>,
	#[serde(default)]
	message: Option<String>,
}

fn parse_pubkey(value: &str) -> Result<Pubkey, GateError> {
	Pubkey::from_str(value)
		.map_err(|e| GateError::InvalidInstruction(format!("bad pubkey {}: {}", value, e)))
}

fn decode_instruction(payload: InstructionPayload) -> Result<Instruction, GateError> {
	let accounts = payload
		.accounts
		.iter()
		.map(|meta| {
			let pubkey = parse_pubkey(&meta.pubkey)?;
			Ok(if meta.is_writable {
				AccountMeta::new(pubkey, meta.is_signer)
			} else {
				AccountMeta::new_readonly(pubkey, meta.is_signer)
			})
		})
		.collect::<Result<Vec<_>, GateError>>()?;

	let data = STANDARD
		.decode(&payload.data)
		.map_err(|e| GateError::InvalidInstruction(format!("bad instruction data: {}", e)))?;

	Ok(Instruction {
		program_id: parse_pubkey(&payload.program_id)?,
		accounts,
		data,
	})
}

fn into_status(payload: StatusPayload) -> Result<VerifierStatus, GateError> {
	match payload.status {
		StatusKind::Idle => Ok(VerifierStatus::Idle),
		StatusKind::Collecting => Ok(VerifierStatus::Collecting),
		StatusKind::Active => {
			let instruction = payload.instruction.ok_or_else(|| {
				GateError::InvalidInstruction("active status without instruction".to_string())
			})?;
			Ok(VerifierStatus::Active(decode_instruction(instruction)?))
		}
		StatusKind::Error => Ok(VerifierStatus::Error(
			payload
				.message
				.unwrap_or_else(|| "verification failed".to_string()),
		)),
	}
}

/// Verifier reached over HTTP
pub struct HttpGatewayVerifier {
	http_client: Client,
	base_url: String,
}

impl HttpGatewayVerifier {
	pub fn new(base_url: String) -> Result<Self, GateError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| GateError::Verifier(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl GatewayVerifier for HttpGatewayVerifier {
	async fn request_challenge(&self, wallet: &Pubkey, network: &Pubkey) -> Result<(), GateError> {
		let url = format!("{}/challenge", self.base_url);
		self.http_client
			.post(&url)
			.json(&json!({
				"wallet": wallet.to_string(),
				"network": network.to_string(),
			}))
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| GateError::Verifier(e.to_string()))?;
		Ok(())
	}

	async fn status(&self, wallet: &Pubkey, network: &Pubkey) -> Result<VerifierStatus, GateError> {
		let url = format!("{}/status", self.base_url);
		let payload: StatusPayload = self
			.http_client
			.get(&url)
			.query(&[("wallet", wallet.to_string()), ("network", network.to_string())])
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| GateError::Verifier(e.to_string()))?
			.json()
			.await
			.map_err(|e| GateError::Verifier(e.to_string()))?;

		debug!("Verifier status for {}: {:?}", wallet, payload.status);
		into_status(payload)
	}
}
