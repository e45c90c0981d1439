//! HTTP client forwarding hardware self-registrations to the registry
//! service.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Header carrying the shared registration token.
const TOKEN_HEADER: &str = "x-internal-token";
/// Fixed timeout for a registration forward; on expiry the attempt is
/// abandoned and the hardware retries on its own schedule.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Error raised by a registration forward.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The request never produced a response (network failure or timeout).
    #[error("registry unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The registry answered with a non-success status.
    #[error("registry rejected the registration with status {0}")]
    Rejected(StatusCode),
}

/// Authenticated client for the registry's internal registration endpoints.
///
/// Both endpoints are idempotent on the registry side: re-registering an
/// already-known id updates it rather than duplicating it, so the gateway
/// can forward every announcement it sees without bookkeeping.
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RegistryClient {
    /// Build a client for the given registry base URL and shared token.
    pub fn new(base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REGISTRATION_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Forward a controller announcement.
    pub async fn register_controller(&self, payload: &Value) -> Result<(), RegistryError> {
        self.post("/internal/controllers/register", payload).await
    }

    /// Forward a device announcement.
    pub async fn register_device(&self, payload: &Value) -> Result<(), RegistryError> {
        self.post("/internal/devices/register", payload).await
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<(), RegistryError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(TOKEN_HEADER, &self.token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::Rejected(status))
        }
    }
}
