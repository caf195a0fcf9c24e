//! OAuth HTTP endpoints.
//!
//! The callback handler normalizes the three provider callback shapes
//! into the single (code, state) contract the core service expects:
//! OAuth2 sends `code`/`state` directly, OAuth1 sends
//! `oauth_token`/`oauth_verifier`, and the Telegram widget returns the
//! signed user payload as individual query parameters.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use postbridge_domain::{ConnectError, Platform, SocialProfile};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/oauth/init", get(oauth_init))
        .route("/oauth/callback/{platform}", get(oauth_callback))
        .route("/oauth/disconnect/{platform}", post(oauth_disconnect))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct InitParams {
    platform: String,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    business: bool,
}

#[derive(Debug, Serialize)]
struct InitResponse {
    auth_url: String,
    state: String,
}

async fn oauth_init(
    State(state): State<AppState>,
    Query(params): Query<InitParams>,
) -> Result<Json<InitResponse>, ApiError> {
    let platform: Platform = params.platform.parse()?;
    let auth = state
        .connections
        .build_authorization_url(
            platform,
            params.redirect_uri.as_deref().unwrap_or(""),
            params.user_id.as_deref(),
            params.business,
        )
        .await?;
    Ok(Json(InitResponse { auth_url: auth.url, state: auth.state }))
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    success: bool,
    platform: Platform,
    profile: ProfileBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProfileBody {
    external_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<SocialProfile> for ProfileBody {
    fn from(p: SocialProfile) -> Self {
        Self { external_id: p.external_id, display_name: p.display_name, avatar_url: p.avatar_url }
    }
}

async fn oauth_callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let platform: Platform = platform.parse()?;

    // Providers report user denial and their own failures via `error`.
    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| "provider reported an error".into());
        return Err(ConnectError::TokenExchange(format!("{error}: {description}")).into());
    }

    let (code, state_token) = extract_code_and_state(platform, &params)?;
    let outcome = state
        .connections
        .complete_connection(platform, &code, &state_token, "")
        .await?;

    Ok(Json(CallbackResponse {
        success: true,
        platform,
        profile: SocialProfile {
            external_id: outcome.record.external_account_id,
            display_name: outcome.record.display_name,
            avatar_url: outcome.record.avatar_url,
        }
        .into(),
        warning: outcome.profile_warning,
    }))
}

/// Normalize the provider callback into the (code, state) pair.
fn extract_code_and_state(
    platform: Platform,
    params: &BTreeMap<String, String>,
) -> Result<(String, String), ApiError> {
    let state = params
        .get("state")
        .cloned()
        .ok_or_else(|| ConnectError::StateVerification("missing state parameter".into()))?;

    let code = match platform {
        Platform::Twitter => {
            let token = params.get("oauth_token").ok_or_else(|| {
                ConnectError::TokenExchange("missing oauth_token parameter".into())
            })?;
            let verifier = params.get("oauth_verifier").ok_or_else(|| {
                ConnectError::TokenExchange("missing oauth_verifier parameter".into())
            })?;
            format!("{token}:{verifier}")
        }
        Platform::Telegram => {
            // The widget returns the signed payload as flat query
            // parameters; reassemble it for signature verification.
            let payload: BTreeMap<&String, &String> =
                params.iter().filter(|(key, _)| key.as_str() != "state").collect();
            serde_json::to_string(&payload).map_err(|e| {
                ConnectError::Internal(format!("payload serialization failed: {e}"))
            })?
        }
        _ => params
            .get("code")
            .cloned()
            .ok_or_else(|| ConnectError::TokenExchange("missing code parameter".into()))?,
    };

    Ok((code, state))
}

#[derive(Debug, Deserialize)]
struct DisconnectParams {
    user_id: String,
}

async fn oauth_disconnect(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<DisconnectParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let platform: Platform = platform.parse()?;
    state.connections.disconnect(&params.user_id, platform).await?;
    Ok(Json(json!({"success": true})))
}
