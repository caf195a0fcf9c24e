//! Connection service: the authorization URL builder and code exchange
//! engine behind the OAuth redirect round-trip.
//!
//! One instance serves all platforms; provider mechanics live in the
//! adapters, CSRF/PKCE bookkeeping in the state store, persistence in the
//! connection repository (the vault).

use std::sync::Arc;

use postbridge_common::auth::{generate_state, PkceChallenge};
use postbridge_domain::{
    ConnectError, ConnectionStatus, Platform, Result, SocialProfile, TokenRecord,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ports::{AuthRequest, ConnectionRepository, ExchangeRequest, StateStore};
use crate::registry::PlatformRegistry;
use crate::retry::retry_once_on_network;

/// Result of building an authorization URL.
#[derive(Debug, Clone)]
pub struct AuthorizationUrl {
    pub url: String,
    pub state: String,
}

/// Result of completing a connection.
///
/// `profile_warning` is set when the exchange succeeded but the identity
/// lookup failed; the record is saved with placeholder identity and the
/// warning surfaces to the caller instead of failing the flow.
#[derive(Debug, Clone)]
pub struct ConnectionOutcome {
    pub record: TokenRecord,
    pub profile_warning: Option<String>,
}

/// Orchestrates the OAuth connection lifecycle.
pub struct ConnectionService {
    registry: Arc<PlatformRegistry>,
    state_store: Arc<dyn StateStore>,
    connections: Arc<dyn ConnectionRepository>,
    state_ttl_secs: i64,
}

impl ConnectionService {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        state_store: Arc<dyn StateStore>,
        connections: Arc<dyn ConnectionRepository>,
        state_ttl_secs: i64,
    ) -> Self {
        Self { registry, state_store, connections, state_ttl_secs }
    }

    /// Build the provider authorization URL and persist the state entry.
    ///
    /// Scopes are the platform defaults, extended with elevated business
    /// scopes when `business` is set. PKCE parameters are attached for
    /// platforms that use PKCE; the verifier stays in the state entry.
    pub async fn build_authorization_url(
        &self,
        platform: Platform,
        redirect_uri: &str,
        user_id: Option<&str>,
        business: bool,
    ) -> Result<AuthorizationUrl> {
        let config = self.registry.get_config(platform, user_id).await?;
        let adapter = self.registry.adapter(platform)?;

        let redirect_uri = resolve_redirect(redirect_uri, config.redirect_uri.as_deref())?;
        let state = generate_state();
        let mut data = postbridge_domain::StateData::new(platform, user_id.map(str::to_string));

        let pkce = if config.uses_pkce {
            let pkce = PkceChallenge::generate();
            data.pkce_verifier = Some(pkce.verifier.clone());
            Some(pkce)
        } else {
            None
        };

        let scope = config.scope_string(business);
        let auth = adapter
            .build_auth_url(AuthRequest {
                config,
                redirect_uri,
                state: state.clone(),
                scope,
                pkce,
            })
            .await?;

        if let Some(secret) = auth.request_token_secret {
            data.request_token_secret = Some(secret);
        }

        self.state_store.put(&state, data, self.state_ttl_secs).await?;

        info!(platform = %platform, "issued authorization url");
        Ok(AuthorizationUrl { url: auth.url, state })
    }

    /// Complete the redirect round-trip: verify state, exchange the code,
    /// fetch the identity, and persist the connection.
    pub async fn complete_connection(
        &self,
        platform: Platform,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<ConnectionOutcome> {
        // Fail-closed CSRF check; the entry is gone after this call.
        let state_data = self.state_store.verify_and_consume(state).await?;
        if state_data.platform != platform {
            return Err(ConnectError::StateVerification(format!(
                "state was issued for {}, callback arrived for {platform}",
                state_data.platform
            )));
        }

        let config = self.registry.get_config(platform, state_data.user_id.as_deref()).await?;
        let adapter = self.registry.adapter(platform)?;

        if config.uses_pkce && state_data.pkce_verifier.is_none() {
            return Err(ConnectError::PkceVerification(
                "platform requires PKCE but no verifier was stored for this state".into(),
            ));
        }

        let redirect_uri = resolve_redirect(redirect_uri, config.redirect_uri.as_deref())?;
        let tokens = adapter
            .exchange_code(ExchangeRequest {
                config: &config,
                code,
                redirect_uri: &redirect_uri,
                state_data: &state_data,
            })
            .await?;

        // Identity lookup failure does not roll back the exchange: the
        // token is valid and the profile is recoverable later.
        let (profile, profile_warning) = match retry_once_on_network(|| {
            adapter.fetch_profile(&config, &tokens.access_token)
        })
        .await
        {
            Ok(profile) => (profile, None),
            Err(err) => {
                warn!(platform = %platform, error = %err, "profile fetch failed, saving connection with placeholder identity");
                let placeholder = SocialProfile {
                    external_id: format!("pending-{}", Uuid::new_v4()),
                    display_name: None,
                    avatar_url: None,
                };
                (placeholder, Some(err.to_string()))
            }
        };

        let user_id = owner_for(&state_data.user_id, platform, &profile);

        // The same external account may not be linked to two users.
        if let Some(existing) =
            self.connections.find_by_external_account(platform, &profile.external_id).await?
        {
            if existing.user_id != user_id {
                return Err(ConnectError::duplicate_connection(format!(
                    "{platform} account {} is already connected to another user",
                    profile.external_id
                )));
            }
        }

        let now = chrono::Utc::now();
        let record = TokenRecord {
            id: Uuid::now_v7().to_string(),
            user_id,
            platform,
            external_account_id: profile.external_id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_type: tokens.token_type.clone(),
            expires_at: tokens.expires_at,
            scope: tokens.scope.clone(),
            status: ConnectionStatus::Active,
            is_primary: false, // repository promotes the first record
            last_used_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let record = self.connections.upsert(record).await?;
        info!(platform = %platform, external_account = %record.external_account_id, "connection completed");

        Ok(ConnectionOutcome { record, profile_warning })
    }

    /// Disconnect a platform: best-effort upstream revoke, then local
    /// revocation (which always succeeds).
    pub async fn disconnect(&self, user_id: &str, platform: Platform) -> Result<()> {
        let record = self
            .connections
            .get(user_id, platform)
            .await?
            .ok_or_else(|| ConnectError::connection(format!("no {platform} connection")))?;

        let config = self.registry.get_config(platform, Some(user_id)).await?;
        let adapter = self.registry.adapter(platform)?;

        if let Err(err) = adapter.revoke_token(&config, &record.access_token).await {
            warn!(platform = %platform, error = %err, "upstream token revocation failed, revoking locally anyway");
        }

        self.connections.mark_revoked(&record.id).await?;
        info!(platform = %platform, "connection revoked");
        Ok(())
    }
}

/// Pick the effective redirect URI: explicit caller value first, then the
/// per-user/config override.
fn resolve_redirect(explicit: &str, configured: Option<&str>) -> Result<String> {
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }
    configured
        .map(str::to_string)
        .ok_or_else(|| ConnectError::Config("no redirect URI supplied or configured".into()))
}

/// Owner of the new record. Unauthenticated flows attribute the
/// connection to a deterministic external-identity key so it can be
/// claimed once the surrounding application knows the user.
fn owner_for(user_id: &Option<String>, platform: Platform, profile: &SocialProfile) -> String {
    match user_id {
        Some(user_id) => user_id.clone(),
        None => format!("social:{platform}:{}", profile.external_id),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the connection service.
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use postbridge_domain::{
        FlowKind, PlatformConfig, StateData, TokenSet, UserPlatformCredentials,
    };
    use tokio::sync::Mutex;

    use super::*;
    use crate::ports::{AuthUrl, CredentialsRepository, PlatformAdapter};
    use crate::registry::PlatformRegistry;

    // ------------------------------------------------------------------
    // In-memory test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStateStore {
        entries: Mutex<HashMap<String, StateData>>,
    }

    #[async_trait]
    impl StateStore for MemoryStateStore {
        async fn put(&self, state: &str, data: StateData, _ttl_secs: i64) -> Result<()> {
            self.entries.lock().await.insert(state.to_string(), data);
            Ok(())
        }

        async fn verify_and_consume(&self, state: &str) -> Result<StateData> {
            self.entries
                .lock()
                .await
                .remove(state)
                .ok_or_else(|| ConnectError::StateVerification("unknown state".into()))
        }
    }

    #[derive(Default)]
    struct MemoryConnections {
        records: Mutex<Vec<TokenRecord>>,
    }

    #[async_trait]
    impl ConnectionRepository for MemoryConnections {
        async fn get(&self, user_id: &str, platform: Platform) -> Result<Option<TokenRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .find(|r| r.user_id == user_id && r.platform == platform && r.is_primary)
                .cloned())
        }

        async fn find_by_external_account(
            &self,
            platform: Platform,
            external_account_id: &str,
        ) -> Result<Option<TokenRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .iter()
                .find(|r| {
                    r.platform == platform
                        && r.external_account_id == external_account_id
                        && r.status != ConnectionStatus::Revoked
                })
                .cloned())
        }

        async fn upsert(&self, mut record: TokenRecord) -> Result<TokenRecord> {
            let mut records = self.records.lock().await;
            let has_primary = records
                .iter()
                .any(|r| r.user_id == record.user_id && r.platform == record.platform && r.is_primary);
            record.is_primary = !has_primary;
            records.retain(|r| {
                !(r.user_id == record.user_id
                    && r.platform == record.platform
                    && r.external_account_id == record.external_account_id)
            });
            records.push(record.clone());
            Ok(record)
        }

        async fn update_tokens(
            &self,
            _id: &str,
            _tokens: &TokenSet,
            _expected_version: i64,
        ) -> Result<bool> {
            Ok(true)
        }

        async fn set_status(&self, id: &str, status: ConnectionStatus) -> Result<()> {
            for r in self.records.lock().await.iter_mut() {
                if r.id == id {
                    r.status = status;
                }
            }
            Ok(())
        }

        async fn mark_revoked(&self, id: &str) -> Result<()> {
            for r in self.records.lock().await.iter_mut() {
                if r.id == id {
                    r.access_token.clear();
                    r.refresh_token = None;
                    r.status = ConnectionStatus::Revoked;
                }
            }
            Ok(())
        }

        async fn touch_last_used(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NoCredentials;

    #[async_trait]
    impl CredentialsRepository for NoCredentials {
        async fn get(
            &self,
            _user_id: &str,
            _platform: Platform,
        ) -> Result<Option<UserPlatformCredentials>> {
            Ok(None)
        }

        async fn upsert(&self, _credentials: UserPlatformCredentials) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _user_id: &str, _platform: Platform) -> Result<()> {
            Ok(())
        }
    }

    /// Scriptable adapter: succeeds with fixed tokens/profile unless a
    /// failure is configured.
    struct ScriptedAdapter {
        platform: Platform,
        fail_exchange: Option<ConnectError>,
        fail_profile: bool,
    }

    impl ScriptedAdapter {
        fn ok(platform: Platform) -> Self {
            Self { platform, fail_exchange: None, fail_profile: false }
        }
    }

    #[async_trait]
    impl PlatformAdapter for ScriptedAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
            let mut url = format!(
                "{}?client_id={}&state={}&scope={}",
                request.config.authorize_url, request.config.client_id, request.state, request.scope
            );
            if let Some(pkce) = &request.pkce {
                url.push_str(&format!("&code_challenge={}", pkce.challenge));
            }
            Ok(AuthUrl { url, request_token_secret: None })
        }

        async fn exchange_code(&self, _request: ExchangeRequest<'_>) -> Result<TokenSet> {
            if let Some(err) = &self.fail_exchange {
                return Err(clone_error(err));
            }
            Ok(TokenSet::new("fresh-access".into(), Some("fresh-refresh".into()), Some(3600), None))
        }

        async fn fetch_profile(
            &self,
            _config: &PlatformConfig,
            _access_token: &str,
        ) -> Result<SocialProfile> {
            if self.fail_profile {
                return Err(ConnectError::ProfileFetch("identity endpoint returned 500".into()));
            }
            Ok(SocialProfile {
                external_id: "ext-123".into(),
                display_name: Some("Test Account".into()),
                avatar_url: None,
            })
        }

        async fn refresh_token(
            &self,
            _config: &PlatformConfig,
            _refresh_token: &str,
        ) -> Result<TokenSet> {
            Ok(TokenSet::new("rotated".into(), None, Some(3600), None))
        }

        async fn revoke_token(&self, _config: &PlatformConfig, _access_token: &str) -> Result<()> {
            Ok(())
        }
    }

    fn clone_error(err: &ConnectError) -> ConnectError {
        serde_json::from_value(serde_json::to_value(err).expect("serialize error"))
            .expect("deserialize error")
    }

    fn google_config() -> PlatformConfig {
        PlatformConfig {
            platform: Platform::Google,
            client_id: "cid".into(),
            client_secret: "secret".into(),
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            profile_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
            revoke_url: None,
            scopes: vec!["openid".into(), "email".into()],
            business_scopes: vec!["https://www.googleapis.com/auth/youtube".into()],
            uses_pkce: true,
            flow: FlowKind::AuthorizationCode,
            redirect_uri: None,
        }
    }

    struct Harness {
        service: ConnectionService,
        connections: Arc<MemoryConnections>,
    }

    fn harness(adapter: ScriptedAdapter) -> Harness {
        let mut configs = HashMap::new();
        configs.insert(Platform::Google, google_config());
        let mut adapters: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
        adapters.insert(Platform::Google, Arc::new(adapter));

        let registry = Arc::new(PlatformRegistry::new(configs, adapters, Arc::new(NoCredentials)));
        let connections = Arc::new(MemoryConnections::default());
        let service = ConnectionService::new(
            registry,
            Arc::new(MemoryStateStore::default()),
            connections.clone(),
            3600,
        );
        Harness { service, connections }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    /// Validates the URL builder output: state round-trips and PKCE
    /// parameters appear for PKCE platforms.
    #[tokio::test]
    async fn test_build_authorization_url() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        assert!(auth.url.contains(&format!("state={}", auth.state)));
        assert!(auth.url.contains("code_challenge="));
        assert!(!auth.url.contains("youtube"));
    }

    /// Validates that the business flag widens the scope list.
    #[tokio::test]
    async fn test_business_scopes() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", None, true)
            .await
            .unwrap();
        assert!(auth.url.contains("youtube"));
    }

    /// Validates the happy-path exchange: record saved, first record is
    /// primary, tokens come from the adapter.
    #[tokio::test]
    async fn test_complete_connection() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        let outcome = h
            .service
            .complete_connection(Platform::Google, "auth-code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();

        assert!(outcome.profile_warning.is_none());
        assert_eq!(outcome.record.user_id, "u1");
        assert_eq!(outcome.record.external_account_id, "ext-123");
        assert_eq!(outcome.record.access_token, "fresh-access");
        assert!(outcome.record.is_primary);
    }

    /// Validates state single-use end to end: the second completion with
    /// the same state fails with a state-verification error.
    #[tokio::test]
    async fn test_state_single_use() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        h.service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();

        let replay = h
            .service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await;
        assert!(matches!(replay, Err(ConnectError::StateVerification(_))));
    }

    /// Validates that a provider rejection surfaces as TokenExchange and
    /// leaves no record behind.
    #[tokio::test]
    async fn test_exchange_rejection_creates_nothing() {
        let h = harness(ScriptedAdapter {
            platform: Platform::Google,
            fail_exchange: Some(ConnectError::TokenExchange("invalid_grant".into())),
            fail_profile: false,
        });
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        let result = h
            .service
            .complete_connection(Platform::Google, "bad", &auth.state, "https://app.example.com/cb")
            .await;

        match result {
            Err(ConnectError::TokenExchange(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(h.connections.records.lock().await.is_empty());
    }

    /// Validates that a profile-fetch failure saves the connection with
    /// placeholder identity and a warning instead of failing the flow.
    #[tokio::test]
    async fn test_profile_failure_saves_with_warning() {
        let h = harness(ScriptedAdapter {
            platform: Platform::Google,
            fail_exchange: None,
            fail_profile: true,
        });
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        let outcome = h
            .service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();

        assert!(outcome.profile_warning.is_some());
        assert!(outcome.record.external_account_id.starts_with("pending-"));
        assert_eq!(outcome.record.access_token, "fresh-access");
    }

    /// Validates the duplicate-account guard: the same external account
    /// connected by a second user is rejected with a duplicate error.
    #[tokio::test]
    async fn test_duplicate_external_account_rejected() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));

        for (user, expect_ok) in [("u1", true), ("u2", false)] {
            let auth = h
                .service
                .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some(user), false)
                .await
                .unwrap();
            let result = h
                .service
                .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
                .await;

            if expect_ok {
                result.unwrap();
            } else {
                assert!(matches!(
                    result,
                    Err(ConnectError::Connection { duplicate: true, .. })
                ));
            }
        }
    }

    /// Validates that disconnecting frees the external account: after the
    /// first user revokes, a second user can connect the same account.
    #[tokio::test]
    async fn test_reconnect_after_disconnect_allowed() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();
        h.service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();
        h.service.disconnect("u1", Platform::Google).await.unwrap();

        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u2"), false)
            .await
            .unwrap();
        let outcome = h
            .service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();
        assert_eq!(outcome.record.user_id, "u2");
        assert_eq!(outcome.record.external_account_id, "ext-123");
    }

    /// Validates disconnect: token fields cleared and status revoked even
    /// though the upstream revoke is best-effort.
    #[tokio::test]
    async fn test_disconnect_revokes_locally() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();
        h.service
            .complete_connection(Platform::Google, "code", &auth.state, "https://app.example.com/cb")
            .await
            .unwrap();

        h.service.disconnect("u1", Platform::Google).await.unwrap();

        let records = h.connections.records.lock().await;
        let record = records.first().unwrap();
        assert_eq!(record.status, ConnectionStatus::Revoked);
        assert!(record.access_token.is_empty());
        assert!(record.refresh_token.is_none());
    }

    /// Validates that a callback for the wrong platform fails closed.
    #[tokio::test]
    async fn test_platform_mismatch_fails() {
        let h = harness(ScriptedAdapter::ok(Platform::Google));
        let auth = h
            .service
            .build_authorization_url(Platform::Google, "https://app.example.com/cb", Some("u1"), false)
            .await
            .unwrap();

        let result = h
            .service
            .complete_connection(Platform::Facebook, "code", &auth.state, "https://app.example.com/cb")
            .await;
        assert!(matches!(result, Err(ConnectError::StateVerification(_))));
    }
}
