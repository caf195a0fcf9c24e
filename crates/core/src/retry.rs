//! Single-retry helper for transient provider errors.
//!
//! The propagation policy allows exactly one retry, at the profile-fetch
//! and rotation layers only, and only for transport-level failures. All
//! other errors propagate immediately.

use std::future::Future;

use postbridge_domain::constants::RETRY_DELAY_MS;
use postbridge_domain::{ConnectError, Result};
use tracing::debug;

/// Run `op`, retrying once after a short fixed delay if it fails with a
/// network error.
pub async fn retry_once_on_network<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(ConnectError::Network(msg)) => {
            debug!(error = %msg, "transient provider error, retrying once");
            tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
            op().await
        }
        other => other,
    }
}
