//! Telegram adapter: login-widget flow.
//!
//! Telegram performs no code-for-token exchange. The widget posts a
//! signed user payload back to the application; the "code" arriving at
//! the callback is that payload as JSON. Verification follows the login
//! widget contract: HMAC-SHA256 over the sorted `k=v` lines of the
//! payload (minus `hash`), keyed with SHA-256 of the bot token. The
//! verified payload itself is stored as the access token; there is
//! nothing to refresh or revoke.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::constants::WIDGET_MAX_AGE_SECS;
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};
use sha2::{Digest, Sha256};
use url::Url;

use super::oauth2::json_str;

pub struct TelegramAdapter;

impl TelegramAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TelegramAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        // The bot token is the configured credential; its numeric prefix
        // is the bot id the widget endpoint expects.
        let bot_id = request
            .config
            .client_secret
            .split(':')
            .next()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| ConnectError::Config("telegram bot token is malformed".into()))?;

        let mut return_to = Url::parse(&request.redirect_uri)
            .map_err(|e| ConnectError::Config(format!("bad redirect URI: {e}")))?;
        return_to.query_pairs_mut().append_pair("state", &request.state);

        // Url::port() is None for scheme-default ports, which the widget
        // origin omits; an explicit port must be part of the origin.
        let origin = match return_to.port() {
            Some(port) => format!(
                "{}://{}:{port}",
                return_to.scheme(),
                return_to.host_str().unwrap_or_default()
            ),
            None => format!(
                "{}://{}",
                return_to.scheme(),
                return_to.host_str().unwrap_or_default()
            ),
        };

        let mut url = Url::parse(&request.config.authorize_url)
            .map_err(|e| ConnectError::Config(format!("bad authorize_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("bot_id", bot_id)
            .append_pair("origin", &origin)
            .append_pair("return_to", return_to.as_str());

        Ok(AuthUrl { url: url.to_string(), request_token_secret: None })
    }

    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet> {
        let payload: serde_json::Value = serde_json::from_str(request.code).map_err(|e| {
            ConnectError::TokenExchange(format!("telegram payload is not valid JSON: {e}"))
        })?;

        verify_widget_payload(&payload, &request.config.client_secret)?;

        // The verified payload is the credential.
        Ok(TokenSet {
            access_token: payload.to_string(),
            refresh_token: None,
            token_type: "TelegramWidget".to_string(),
            expires_at: None,
            scope: None,
        })
    }

    async fn fetch_profile(
        &self,
        _config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let payload: serde_json::Value = serde_json::from_str(access_token).map_err(|e| {
            ConnectError::ProfileFetch(format!("stored telegram payload is invalid: {e}"))
        })?;

        let external_id = json_str(&payload, "id")
            .ok_or_else(|| ConnectError::ProfileFetch("telegram payload missing id".into()))?;
        let display_name = json_str(&payload, "username").or_else(|| {
            let first = json_str(&payload, "first_name");
            let last = json_str(&payload, "last_name");
            match (first, last) {
                (Some(f), Some(l)) => Some(format!("{f} {l}")),
                (Some(f), None) => Some(f),
                _ => None,
            }
        });

        Ok(SocialProfile {
            external_id,
            display_name,
            avatar_url: json_str(&payload, "photo_url"),
        })
    }

    async fn refresh_token(
        &self,
        _config: &PlatformConfig,
        _refresh_token: &str,
    ) -> Result<TokenSet> {
        Err(ConnectError::TokenRefresh("telegram widget credentials do not refresh".into()))
    }

    async fn revoke_token(&self, _config: &PlatformConfig, _access_token: &str) -> Result<()> {
        Ok(())
    }
}

/// Verify the widget signature and freshness.
fn verify_widget_payload(payload: &serde_json::Value, bot_token: &str) -> Result<()> {
    let object = payload.as_object().ok_or_else(|| {
        ConnectError::TokenExchange("telegram payload must be a JSON object".into())
    })?;

    let hash = object
        .get("hash")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConnectError::TokenExchange("telegram payload missing hash".into()))?;

    // Sorted k=v lines of everything except the hash itself.
    let mut lines: Vec<String> = object
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{key}={s}"),
            other => format!("{key}={other}"),
        })
        .collect();
    lines.sort();
    let data_check_string = lines.join("\n");

    let secret_key = Sha256::digest(bot_token.as_bytes());
    let mut mac = Hmac::<Sha256>::new_from_slice(&secret_key)
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(data_check_string.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if expected != hash.to_lowercase() {
        return Err(ConnectError::TokenExchange("telegram payload signature mismatch".into()));
    }

    // The payload may arrive re-parsed from query parameters, where every
    // value is a string.
    let auth_date = object
        .get("auth_date")
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .ok_or_else(|| ConnectError::TokenExchange("telegram payload missing auth_date".into()))?;
    let age = Utc::now().timestamp() - auth_date;
    if age > WIDGET_MAX_AGE_SECS {
        return Err(ConnectError::TokenExchange("telegram payload is too old".into()));
    }

    Ok(())
}
