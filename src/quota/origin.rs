//!
//! Lookup of the caller's public network origin.
//!
//! The origin is part of every ledger token. It is resolved once per process and cached;
//! the lookup itself retries with exponential backoff up to a fixed elapsed time.

use super::types::QuotaError;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Source of the caller's public origin address
#[async_trait]
pub trait OriginResolver: Send + Sync {
	async fn origin(&self) -> Result<String, QuotaError>;
}

/// Fixed origin, for callers that already know their address
pub struct StaticOrigin(pub String);

#[async_trait]
impl OriginResolver for StaticOrigin {
	async fn origin(&self) -> Result<String, QuotaError> {
		Ok(self.0.clone())
	}
}

#[derive(Deserialize)]
struct OriginResponse {
	ip: String,
}

/// Origin looked up from an HTTP echo service returning `{ "ip": ... }`
pub struct HttpOriginResolver {
	http_client: Client,
	url: String,
	max_elapsed: Duration,
	cached: OnceCell<String>,
}

impl HttpOriginResolver {
	pub fn new(url: String) -> Result<Self, QuotaError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(5))
			.build()
			.map_err(|e| QuotaError::OriginUnavailable(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			url,
			max_elapsed: Duration::from_secs(20),
			cached: OnceCell::new(),
		})
	}

	async fn lookup(&self) -> Result<String, QuotaError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.max_elapsed),
			..ExponentialBackoff::default()
		};

		let response = retry(policy, || async {
			let response = self
				.http_client
				.get(&self.url)
				.send()
				.await
				.and_then(|r| r.error_for_status())
				.map_err(|e| {
					warn!("Origin lookup at {} failed: {}", self.url, e);
					backoff::Error::transient(e)
				})?;

			response
				.json::<OriginResponse>()
				.await
				.map_err(backoff::Error::permanent)
		})
		.await
		.map_err(|e| QuotaError::OriginUnavailable(e.to_string()))?;

		info!("Resolved network origin {}", response.ip);
		Ok(response.ip)
	}
}

#[async_trait]
impl OriginResolver for HttpOriginResolver {
	async fn origin(&self) -> Result<String, QuotaError> {
		let origin = self.cached.get_or_try_init(|| self.lookup()).await?;
		debug!("Using network origin {}", origin);
		Ok(origin.clone())
	}
}
