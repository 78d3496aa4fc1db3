//! Signed intent source polling an HTTP endpoint.
//!
//! The endpoint answers `GET` with a JSON array of
//! [`SignedIntentPayload`]s. Entries that fail to parse are logged and
//! dropped; the rest of the batch is still returned.

use async_trait::async_trait;
use relayer_types::SignedSubmission;
use std::time::Duration;

use crate::{DiscoveryError, SignedIntentPayload, SignedIntentSource};

pub struct HttpSignedIntentSource {
	client: reqwest::Client,
	endpoint: String,
}

impl HttpSignedIntentSource {
	pub fn new(endpoint: impl Into<String>) -> Result<Self, DiscoveryError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| DiscoveryError::Source(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: endpoint.into(),
		})
	}
}

#[async_trait]
impl SignedIntentSource for HttpSignedIntentSource {
	fn name(&self) -> &str {
		&self.endpoint
	}

	async fn poll_pending(&self) -> Result<Vec<SignedSubmission>, DiscoveryError> {
		let response = self
			.client
			.get(&self.endpoint)
			.send()
			.await
			.map_err(|e| DiscoveryError::Source(format!("Request failed: {}", e)))?;

		if !response.status().is_success() {
			return Err(DiscoveryError::Source(format!(
				"Endpoint returned {}",
				response.status()
			)));
		}

		let payloads: Vec<SignedIntentPayload> = response
			.json()
			.await
			.map_err(|e| DiscoveryError::Source(format!("Invalid response body: {}", e)))?;

		let mut pending = Vec::with_capacity(payloads.len());
		for payload in payloads {
			match SignedSubmission::try_from(payload) {
				Ok(submission) => pending.push(submission),
				Err(e) => tracing::warn!(endpoint = %self.endpoint, "Dropping signed intent: {}", e),
			}
		}

		Ok(pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::U256;
	use serde_json::json;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn entry(amount_in: &str) -> serde_json::Value {
		json!({
			"fromToken": "0x1111111111111111111111111111111111111111",
			"toToken": "0x2222222222222222222222222222222222222222",
			"amountIn": amount_in,
			"minAmountOut": "90",
			"recipient": "0x3333333333333333333333333333333333333333",
			"deadline": "1900000000",
			"nonce": "0",
			"signature": format!("0x{}", "22".repeat(65)),
		})
	}

	#[tokio::test]
	async fn test_polls_and_parses_batch() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/pending"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([entry("100"), entry("oops")])))
			.mount(&server)
			.await;

		let source = HttpSignedIntentSource::new(format!("{}/pending", server.uri())).unwrap();
		let pending = source.poll_pending().await.unwrap();

		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].intent.amountIn, U256::from(100u64));
	}

	#[tokio::test]
	async fn test_error_status_reported() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let source = HttpSignedIntentSource::new(server.uri()).unwrap();
		assert!(matches!(
			source.poll_pending().await,
			Err(DiscoveryError::Source(_))
		));
	}
}
