//! Token and connection records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Normalized token response from any provider.
///
/// `expires_at` of `None` means the provider issued a token without expiry
/// metadata (e.g. Facebook long-lived tokens); such tokens are treated as
/// valid until a provider call says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    /// Optional because several providers never issue one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub token_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Build a token set, converting a relative `expires_in` into an
    /// absolute timestamp at creation time.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        scope: Option<String>,
    ) -> Self {
        let expires_at = expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at,
            scope,
        }
    }

    /// Whether the token is expired or expires within `threshold_seconds`.
    ///
    /// Tokens without expiry metadata are never considered expired.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(threshold_seconds) >= expires_at,
            None => false,
        }
    }

    /// Seconds until expiry, or `None` when no expiry is set.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// Lifecycle state of a stored connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    TokenExpired,
    Revoked,
    Error,
}

impl ConnectionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::TokenExpired => "token_expired",
            ConnectionStatus::Revoked => "revoked",
            ConnectionStatus::Error => "error",
        }
    }

    /// Parse a stored status string; unknown values degrade to `Error`.
    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "active" => ConnectionStatus::Active,
            "token_expired" => ConnectionStatus::TokenExpired,
            "revoked" => ConnectionStatus::Revoked,
            _ => ConnectionStatus::Error,
        }
    }
}

/// Minimal identity fetched from a provider after the code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialProfile {
    pub external_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Durable connection record, one per (user, platform, external account).
///
/// Token fields are plaintext in memory only; the vault encrypts them
/// before they reach storage. `version` backs the optimistic concurrency
/// check used by concurrent rotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub external_account_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub status: ConnectionStatus,
    pub is_primary: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Seconds until token expiry; `None` means no expiry (infinite).
    #[must_use]
    pub fn time_to_expiry(&self) -> Option<i64> {
        self.expires_at.map(|at| (at - Utc::now()).num_seconds())
    }

    /// Whether the access token is inside the rotation window.
    #[must_use]
    pub fn needs_rotation(&self, threshold_seconds: i64) -> bool {
        match self.time_to_expiry() {
            Some(remaining) => remaining <= threshold_seconds,
            None => false,
        }
    }

    /// Whether the token still has any lifetime left.
    #[must_use]
    pub fn still_valid(&self) -> bool {
        match self.time_to_expiry() {
            Some(remaining) => remaining > 0,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::connection.
    use super::*;

    fn record_with_expiry(expires_in_secs: Option<i64>) -> TokenRecord {
        let now = Utc::now();
        TokenRecord {
            id: "rec-1".into(),
            user_id: "u1".into(),
            platform: Platform::Google,
            external_account_id: "ext-1".into(),
            display_name: None,
            avatar_url: None,
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            token_type: "Bearer".into(),
            expires_at: expires_in_secs.map(|s| now + Duration::seconds(s)),
            scope: None,
            status: ConnectionStatus::Active,
            is_primary: true,
            last_used_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates `TokenSet::new` expiry math and the missing-expiry case.
    #[test]
    fn test_token_set_expiry() {
        let with_expiry = TokenSet::new("at".into(), None, Some(3600), None);
        assert!(with_expiry.expires_at.is_some());
        assert!(!with_expiry.is_expired(300));
        assert!(with_expiry.is_expired(7200));

        let without_expiry = TokenSet::new("at".into(), None, None, None);
        assert!(without_expiry.expires_at.is_none());
        assert!(!without_expiry.is_expired(i64::MAX / 4));
        assert!(without_expiry.seconds_until_expiry().is_none());
    }

    /// Validates the rotation window boundary: 29 minutes left rotates at a
    /// 30-minute threshold, 31 minutes does not.
    #[test]
    fn test_rotation_boundary() {
        let threshold = 30 * 60;
        assert!(record_with_expiry(Some(29 * 60)).needs_rotation(threshold));
        assert!(!record_with_expiry(Some(31 * 60)).needs_rotation(threshold));
        assert!(!record_with_expiry(None).needs_rotation(threshold));
    }

    /// Validates residual-lifetime checks used by the stale-token fallback.
    #[test]
    fn test_still_valid() {
        assert!(record_with_expiry(Some(300)).still_valid());
        assert!(!record_with_expiry(Some(-10)).still_valid());
        assert!(record_with_expiry(None).still_valid());
    }

    /// Validates status round-trip through storage strings.
    #[test]
    fn test_status_strings() {
        for status in [
            ConnectionStatus::Active,
            ConnectionStatus::TokenExpired,
            ConnectionStatus::Revoked,
            ConnectionStatus::Error,
        ] {
            assert_eq!(ConnectionStatus::from_db(status.as_str()), status);
        }
        assert_eq!(ConnectionStatus::from_db("garbage"), ConnectionStatus::Error);
    }
}
