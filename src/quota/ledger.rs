//!
//! HTTP client for the external mint-count ledger.
//!
//! Every request carries a single HS256 token binding the wallet, its network origin and
//! a mint count. The ledger is the source of truth; nothing is cached locally.

use super::types::*;

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Remote per-identity mint counter
#[async_trait]
pub trait QuotaLedger: Send + Sync {
	/// Look up the record bound to `claims`, `None` if the identity has never minted
	async fn find(&self, claims: &QuotaClaims) -> Result<Option<QuotaRecord>, QuotaError>;

	/// Create or update the record bound to `claims`
	async fn record(&self, claims: &QuotaClaims) -> Result<(), QuotaError>;
}

/// Sign ledger claims with the shared secret
pub fn sign_claims(claims: &QuotaClaims, secret: &[u8]) -> Result<String, QuotaError> {
	encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
		.map_err(|e| QuotaError::Token(e.to_string()))
}

/// Ledger reached over HTTP
#[derive(Clone)]
pub struct HttpQuotaLedger {
	http_client: Client,
	/// Base URL of the ledger service
	base_url: String,
	secret: Vec<u8>,
}

impl HttpQuotaLedger {
	/// Create a new ledger client.
	///
	/// # Arguments
	/// * `base_url` - Root of the ledger service, without trailing slash.
	/// * `secret` - Shared HS256 secret the ledger verifies tokens with.
	pub fn new(base_url: String, secret: impl Into<Vec<u8>>) -> Result<Self, QuotaError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| QuotaError::LedgerUnavailable(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
			secret: secret.into(),
		})
	}

	async fn post(&self, path: &str, claims: &QuotaClaims) -> Result<reqwest::Response, QuotaError> {
		let token = sign_claims(claims, &self.secret)?;
		let url = format!("{}{}", self.base_url, path);
		debug!("POST {} for {}", url, claims.public_key);

		let response = self
			.http_client
			.post(&url)
			.json(&json!({ "token": token }))
			.send()
			.await?
			.error_for_status()?;
		Ok(response)
	}
}

#[async_trait]
impl QuotaLedger for HttpQuotaLedger {
	async fn find(&self, claims: &QuotaClaims) -> Result<Option<QuotaRecord>, QuotaError> {
		let records: Vec<QuotaRecord> = self.post("/user/find", claims).await?.json().await?;

		match records.len() {
			0 => Ok(None),
			1 => Ok(records.into_iter().next()),
			n => Err(QuotaError::InvalidResponse(format!(
				"expected at most one record for {}, got {}",
				claims.public_key, n
			))),
		}
	}

	async fn record(&self, claims: &QuotaClaims) -> Result<(), QuotaError> {
		self.post("/user/new", claims).await?;
		info!(
			"Recorded mint count {} for {}",
			claims.mint_count, claims.public_key
		);
		Ok(())
	}
}
