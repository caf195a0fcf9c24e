//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for PostBridge connection flows.
///
/// Variants map 1:1 to the failure modes of the OAuth round-trip; the HTTP
/// boundary translates them into status codes. Messages may carry provider
/// error strings for diagnostics but never credentials or token plaintext.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ConnectError {
    /// Platform id is not in the static registry.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// State missing, expired, or already consumed; caller restarts the flow.
    #[error("State verification failed: {0}")]
    StateVerification(String),

    /// PKCE required by the platform but the verifier is missing.
    #[error("PKCE verification failed: {0}")]
    PkceVerification(String),

    /// Provider rejected the authorization code or returned a malformed body.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Identity lookup failed after a successful exchange.
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Connection-level failure (duplicate account, invalid linkage).
    #[error("Connection error: {message}")]
    Connection { message: String, duplicate: bool },

    /// Rotation failed and no usable token remains; reconnection required.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectError {
    /// Duplicate-account connection failure (mapped to HTTP 409).
    pub fn duplicate_connection(msg: impl Into<String>) -> Self {
        Self::Connection { message: msg.into(), duplicate: true }
    }

    /// Non-duplicate connection failure (mapped to HTTP 400).
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection { message: msg.into(), duplicate: false }
    }
}

/// Result type alias for PostBridge operations
pub type Result<T> = std::result::Result<T, ConnectError>;
