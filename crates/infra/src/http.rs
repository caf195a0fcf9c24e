//! Shared HTTP client construction for provider calls.

use std::time::Duration;

use postbridge_domain::constants::HTTP_TIMEOUT_SECS;
use postbridge_domain::{ConnectError, Result};

/// Build the reqwest client used by every adapter.
///
/// One timeout governs all provider calls; slow providers surface as
/// network errors and go through the normal retry policy.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(concat!("postbridge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConnectError::Config(format!("failed to build http client: {e}")))
}
