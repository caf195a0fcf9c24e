//! Supported platforms and their static protocol configuration.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConnectError;

/// Closed set of supported social platforms.
///
/// Adding a platform is a compile-time change: the registry, the adapter
/// table, and the config loader all key off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    Facebook,
    Linkedin,
    Twitter,
    Instagram,
    Tiktok,
    Telegram,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Google,
        Platform::Facebook,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Instagram,
        Platform::Tiktok,
        Platform::Telegram,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Google => "google",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" | "youtube" => Ok(Platform::Google),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" | "x" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "telegram" => Ok(Platform::Telegram),
            other => Err(ConnectError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Grant mechanics a platform uses.
///
/// OAuth1 (legacy Twitter) and the Telegram login widget are variant flows
/// behind the same adapter contract; the kind only affects adapter
/// internals, never the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    AuthorizationCode,
    OAuth1,
    Widget,
}

/// Immutable per-platform protocol configuration, loaded at startup.
///
/// Credentials and redirect URI may be overridden per user; URLs, scopes,
/// flow kind, and PKCE usage are fixed per platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub revoke_url: Option<String>,
    pub scopes: Vec<String>,
    pub business_scopes: Vec<String>,
    pub uses_pkce: bool,
    pub flow: FlowKind,
    pub redirect_uri: Option<String>,
}

impl PlatformConfig {
    /// Space-joined scope list, extended with business scopes on request.
    #[must_use]
    pub fn scope_string(&self, business: bool) -> String {
        let mut scopes = self.scopes.clone();
        if business {
            for scope in &self.business_scopes {
                if !scopes.contains(scope) {
                    scopes.push(scope.clone());
                }
            }
        }
        scopes.join(" ")
    }

    /// Overlay per-user credentials on top of the global defaults.
    ///
    /// Only client_id/client_secret/redirect_uri move; protocol shape stays.
    #[must_use]
    pub fn with_credentials(mut self, creds: &UserPlatformCredentials) -> Self {
        if let Some(client_id) = &creds.client_id {
            self.client_id = client_id.clone();
        }
        if let Some(client_secret) = &creds.client_secret {
            self.client_secret = client_secret.clone();
        }
        if let Some(redirect_uri) = &creds.redirect_uri {
            self.redirect_uri = Some(redirect_uri.clone());
        }
        self
    }
}

/// Optional per-(user, platform) credential override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPlatformCredentials {
    pub user_id: String,
    pub platform: Platform,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
