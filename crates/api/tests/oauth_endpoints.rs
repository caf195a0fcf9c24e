//! Integration tests for the OAuth HTTP endpoints
//!
//! **Purpose**: Test the full in-process stack from HTTP request →
//! router → connection service → vault, without touching the network.
//!
//! **Coverage:**
//! - init → callback round-trip with the state issued by init
//! - Error-status mapping: unknown platform 400, bad state 401,
//!   duplicate account 409, provider `error` parameter 400
//! - Disconnect returns success and revokes the stored record
//!
//! **Infrastructure:**
//! - Scripted in-memory platform adapter (no provider HTTP)
//! - Real in-memory SQLite vault, real state store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use postbridge_api::{build_router, AppState};
use postbridge_common::crypto::EncryptionService;
use postbridge_core::ports::{
    AuthRequest, AuthUrl, CredentialsRepository, ExchangeRequest, PlatformAdapter,
};
use postbridge_core::{ConnectionService, PlatformRegistry, TokenRotationManager};
use postbridge_domain::{
    FlowKind, Platform, PlatformConfig, Result, SocialProfile, TokenSet, UserPlatformCredentials,
};
use postbridge_infra::{DbManager, InMemoryStateStore, TokenVault};
use tower::ServiceExt;

struct ScriptedAdapter;

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        Ok(AuthUrl {
            url: format!("{}?state={}", request.config.authorize_url, request.state),
            request_token_secret: None,
        })
    }

    async fn exchange_code(&self, _request: ExchangeRequest<'_>) -> Result<TokenSet> {
        Ok(TokenSet::new("access".into(), Some("refresh".into()), Some(3600), None))
    }

    async fn fetch_profile(
        &self,
        _config: &PlatformConfig,
        _access_token: &str,
    ) -> Result<SocialProfile> {
        Ok(SocialProfile {
            external_id: "ext-1".into(),
            display_name: Some("Test".into()),
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

fn test_router() -> axum::Router {
    let config = PlatformConfig {
        platform: Platform::Google,
        client_id: "cid".into(),
        client_secret: "secret".into(),
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
        token_url: "https://oauth2.googleapis.com/token".into(),
        profile_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
        revoke_url: None,
        scopes: vec!["openid".into()],
        business_scopes: vec![],
        uses_pkce: true,
        flow: FlowKind::AuthorizationCode,
        redirect_uri: Some("https://app.example.com/cb".into()),
    };
    let mut configs = HashMap::new();
    configs.insert(Platform::Google, config);
    let mut adapters: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert(Platform::Google, Arc::new(ScriptedAdapter));
    let registry = Arc::new(PlatformRegistry::new(configs, adapters, Arc::new(NoCredentials)));

    let db = Arc::new(DbManager::in_memory().expect("db"));
    db.run_migrations().expect("migrations");
    let encryption = Arc::new(
        EncryptionService::new(vec![(1, EncryptionService::generate_key())]).expect("keys"),
    );
    let vault = Arc::new(TokenVault::new(db, encryption));
    let state_store = Arc::new(InMemoryStateStore::new());

    let connections =
        Arc::new(ConnectionService::new(Arc::clone(&registry), state_store, vault.clone(), 3600));
    let rotation = Arc::new(TokenRotationManager::new(registry, vault, 1800));

    build_router(AppState::new(connections, rotation))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn init_then_callback_round_trip() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::get("/oauth/init?platform=google&user_id=u1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let init = body_json(response).await;
    let state = init["state"].as_str().expect("state").to_string();
    assert!(init["auth_url"].as_str().expect("auth_url").contains(&state));

    let response = router
        .oneshot(
            Request::get(format!("/oauth/callback/google?code=abc&state={state}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let callback = body_json(response).await;
    assert_eq!(callback["success"], true);
    assert_eq!(callback["platform"], "google");
    assert_eq!(callback["profile"]["external_id"], "ext-1");
}

#[tokio::test]
async fn unknown_platform_is_bad_request() {
    let router = test_router();
    let response = router
        .oneshot(Request::get("/oauth/init?platform=myspace").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unsupported_platform");
}

#[tokio::test]
async fn unknown_state_is_unauthorized() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::get("/oauth/callback/google?code=abc&state=never-issued")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "state_verification_failed");
}

#[tokio::test]
async fn provider_error_param_is_bad_request() {
    let router = test_router();
    let response = router
        .oneshot(
            Request::get("/oauth/callback/google?error=access_denied&error_description=User+denied&state=x")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "token_exchange_failed");
    assert!(body["error_description"]
        .as_str()
        .expect("description")
        .contains("access_denied"));
}

#[tokio::test]
async fn duplicate_account_is_conflict() {
    let router = test_router();

    for (user, expected) in [("u1", StatusCode::OK), ("u2", StatusCode::CONFLICT)] {
        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/oauth/init?platform=google&user_id={user}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let state = body_json(response).await["state"].as_str().expect("state").to_string();

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/oauth/callback/google?code=abc&state={state}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), expected);
        if expected == StatusCode::CONFLICT {
            let body = body_json(response).await;
            assert_eq!(body["error"], "duplicate_connection");
        }
    }
}

#[tokio::test]
async fn disconnect_revokes_connection() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::get("/oauth/init?platform=google&user_id=u1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let state = body_json(response).await["state"].as_str().expect("state").to_string();
    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/oauth/callback/google?code=abc&state={state}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::post("/oauth/disconnect/google?user_id=u1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    // A second disconnect finds nothing to revoke.
    let response = router
        .oneshot(
            Request::post("/oauth/disconnect/google?user_id=u1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
