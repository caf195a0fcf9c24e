//! Ephemeral state carried across the authorization redirect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Data stored under an opaque state token for the lifetime of one
/// authorization round-trip.
///
/// `pkce_verifier` is set for PKCE platforms; `request_token_secret` is the
/// OAuth1 variant's equivalent. Both are consumed together with the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateData {
    pub platform: Platform,
    /// Unauthenticated flows are allowed; the record is attributed later.
    pub user_id: Option<String>,
    pub pkce_verifier: Option<String>,
    pub request_token_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StateData {
    #[must_use]
    pub fn new(platform: Platform, user_id: Option<String>) -> Self {
        Self {
            platform,
            user_id,
            pkce_verifier: None,
            request_token_secret: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_pkce_verifier(mut self, verifier: String) -> Self {
        self.pkce_verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn with_request_token_secret(mut self, secret: String) -> Self {
        self.request_token_secret = Some(secret);
        self
    }
}
