//! Port interfaces between core business logic and infrastructure
//!
//! These traits define the boundaries the connection flows depend on:
//! the TTL state store, the durable connection store (implemented by the
//! token vault), per-user credential overrides, and the per-platform
//! protocol adapters.

use async_trait::async_trait;
use postbridge_common::auth::PkceChallenge;
use postbridge_domain::{
    ConnectionStatus, Platform, PlatformConfig, Result, SocialProfile, StateData, TokenRecord,
    TokenSet, UserPlatformCredentials,
};

/// Short-TTL key-value store for state/PKCE entries.
///
/// The single source of truth for CSRF and PKCE correctness: a state value
/// must be consumable exactly once.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Store `data` under `state` with the given TTL.
    async fn put(&self, state: &str, data: StateData, ttl_secs: i64) -> Result<()>;

    /// Atomically look up and delete the entry for `state`.
    ///
    /// Fails with a state-verification error when the entry is absent,
    /// expired, or already consumed. Under concurrent duplicate delivery
    /// exactly one caller succeeds.
    async fn verify_and_consume(&self, state: &str) -> Result<StateData>;
}

/// Durable store for connection records.
///
/// The token vault is the only implementation permitted to write token
/// fields; rows it hands out carry decrypted tokens.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Primary connection for (user, platform), if any.
    async fn get(&self, user_id: &str, platform: Platform) -> Result<Option<TokenRecord>>;

    /// Look up a live connection by the provider-side account id.
    ///
    /// Revoked records are not returned: disconnecting releases the
    /// external account for reconnection by any user.
    async fn find_by_external_account(
        &self,
        platform: Platform,
        external_account_id: &str,
    ) -> Result<Option<TokenRecord>>;

    /// Insert or update the record for (user, platform, external account).
    ///
    /// The first record for a (user, platform) pair becomes primary; the
    /// at-most-one-primary invariant is enforced here.
    async fn upsert(&self, record: TokenRecord) -> Result<TokenRecord>;

    /// Replace token fields if the stored version still matches
    /// `expected_version`. Returns `false` on a stale write (the caller
    /// lost a concurrent rotation and should re-read).
    async fn update_tokens(
        &self,
        id: &str,
        tokens: &TokenSet,
        expected_version: i64,
    ) -> Result<bool>;

    /// Flip the lifecycle status of a record.
    async fn set_status(&self, id: &str, status: ConnectionStatus) -> Result<()>;

    /// Clear token fields and mark the record revoked.
    async fn mark_revoked(&self, id: &str) -> Result<()>;

    /// Record a successful use of the connection.
    async fn touch_last_used(&self, id: &str) -> Result<()>;
}

/// Per-(user, platform) client credential overrides.
#[async_trait]
pub trait CredentialsRepository: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<UserPlatformCredentials>>;

    async fn upsert(&self, credentials: UserPlatformCredentials) -> Result<()>;

    async fn delete(&self, user_id: &str, platform: Platform) -> Result<()>;
}

/// Inputs for building a provider authorization URL.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub config: PlatformConfig,
    pub redirect_uri: String,
    pub state: String,
    pub scope: String,
    pub pkce: Option<PkceChallenge>,
}

/// Result of building an authorization URL.
///
/// `request_token_secret` is only set by the OAuth1 variant; it rides in
/// the state entry until the callback leg needs it for signing.
#[derive(Debug, Clone)]
pub struct AuthUrl {
    pub url: String,
    pub request_token_secret: Option<String>,
}

/// Inputs for exchanging a callback code for tokens.
#[derive(Debug)]
pub struct ExchangeRequest<'a> {
    pub config: &'a PlatformConfig,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub state_data: &'a StateData,
}

/// Capability set one platform implements.
///
/// Authorization-code, OAuth1, and widget-signed flows all present the
/// same contract: state in, normalized tokens out. Provider-specific
/// mechanics stay inside the adapter.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Build the provider authorization URL for one round-trip.
    ///
    /// Async because the OAuth1 variant must obtain a request token first.
    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl>;

    /// Exchange the callback code (or variant payload) for tokens.
    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet>;

    /// Fetch the minimal identity behind an access token.
    async fn fetch_profile(
        &self,
        config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile>;

    /// Obtain a fresh token set from a refresh token.
    async fn refresh_token(
        &self,
        config: &PlatformConfig,
        refresh_token: &str,
    ) -> Result<TokenSet>;

    /// Best-effort upstream revocation. Local revocation proceeds
    /// regardless of the outcome.
    async fn revoke_token(&self, config: &PlatformConfig, access_token: &str) -> Result<()>;
}
