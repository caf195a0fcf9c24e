//! Environment-driven configuration.
//!
//! All settings come from `POSTBRIDGE_*` variables. Platform endpoint
//! shapes are fixed in the built-in table; the environment supplies
//! credentials and deployment-specific values. A platform without
//! configured credentials is simply absent from the registry.

use std::collections::HashMap;
use std::env;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use postbridge_domain::constants::{ROTATION_THRESHOLD_SECS, STATE_TTL_SECS};
use postbridge_domain::{ConnectError, FlowKind, Platform, PlatformConfig, Result};
use tracing::info;

/// Everything the process needs at startup.
pub struct Settings {
    pub bind_addr: String,
    pub db_path: String,
    pub db_pool_size: u32,
    pub redirect_base_url: String,
    pub state_ttl_secs: i64,
    pub rotation_threshold_secs: i64,
    /// Versioned token encryption keys, oldest to newest.
    pub token_keys: Vec<(u32, Vec<u8>)>,
    pub telegram_bot_token: Option<String>,
    platform_credentials: HashMap<Platform, (String, String)>,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let redirect_base_url = require("POSTBRIDGE_REDIRECT_BASE_URL")?;
        let token_keys = parse_key_ring(&require("POSTBRIDGE_TOKEN_KEYS")?)?;

        let mut platform_credentials = HashMap::new();
        for platform in Platform::ALL {
            let prefix = platform.as_str().to_uppercase();
            let id = env::var(format!("POSTBRIDGE_{prefix}_CLIENT_ID")).ok();
            let secret = env::var(format!("POSTBRIDGE_{prefix}_CLIENT_SECRET")).ok();
            if let (Some(id), Some(secret)) = (id, secret) {
                platform_credentials.insert(platform, (id, secret));
            }
        }

        let telegram_bot_token = env::var("POSTBRIDGE_TELEGRAM_BOT_TOKEN").ok();
        if let Some(token) = &telegram_bot_token {
            // The widget flow needs no developer app; the bot token is the
            // whole credential.
            platform_credentials
                .insert(Platform::Telegram, (String::new(), token.clone()));
        }

        let settings = Self {
            bind_addr: env::var("POSTBRIDGE_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".into()),
            db_path: env::var("POSTBRIDGE_DB_PATH").unwrap_or_else(|_| "postbridge.db".into()),
            db_pool_size: parse_or("POSTBRIDGE_DB_POOL_SIZE", 8)?,
            redirect_base_url,
            state_ttl_secs: parse_or("POSTBRIDGE_STATE_TTL_SECS", STATE_TTL_SECS)?,
            rotation_threshold_secs: parse_or(
                "POSTBRIDGE_ROTATION_THRESHOLD_SECS",
                ROTATION_THRESHOLD_SECS,
            )?,
            token_keys,
            telegram_bot_token,
            platform_credentials,
        };

        info!(
            platforms = settings.platform_credentials.len(),
            key_versions = settings.token_keys.len(),
            "configuration loaded"
        );
        Ok(settings)
    }

    /// Build the per-platform configuration table for the registry.
    pub fn platform_configs(&self) -> HashMap<Platform, PlatformConfig> {
        self.platform_credentials
            .iter()
            .map(|(&platform, (client_id, client_secret))| {
                let mut config = default_config(platform);
                config.client_id = client_id.clone();
                config.client_secret = client_secret.clone();
                config.redirect_uri = Some(format!(
                    "{}/oauth/callback/{platform}",
                    self.redirect_base_url.trim_end_matches('/')
                ));
                (platform, config)
            })
            .collect()
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|_| ConnectError::Config(format!("{name} is not set")))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConnectError::Config(format!("{name} has an invalid value"))),
        Err(_) => Ok(default),
    }
}

/// Parse `v1:<base64 key>[,v2:<base64 key>,...]` into the key ring.
fn parse_key_ring(raw: &str) -> Result<Vec<(u32, Vec<u8>)>> {
    let mut keys = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        let (version, encoded) = part.split_once(':').ok_or_else(|| {
            ConnectError::Config("POSTBRIDGE_TOKEN_KEYS entries must look like v1:<base64>".into())
        })?;
        let version: u32 = version
            .strip_prefix('v')
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                ConnectError::Config(format!("invalid key version label: {version}"))
            })?;
        let key = BASE64
            .decode(encoded)
            .map_err(|e| ConnectError::Config(format!("key v{version} is not valid base64: {e}")))?;
        keys.push((version, key));
    }
    keys.sort_by_key(|(version, _)| *version);
    Ok(keys)
}

/// Fixed protocol shape per platform. Credentials and redirect URI are
/// filled in from the environment.
pub fn default_config(platform: Platform) -> PlatformConfig {
    let (authorize_url, token_url, profile_url, revoke_url, scopes, business_scopes, uses_pkce, flow) =
        match platform {
            Platform::Google => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://www.googleapis.com/oauth2/v2/userinfo",
                Some("https://oauth2.googleapis.com/revoke"),
                vec!["openid", "email", "profile"],
                vec![
                    "https://www.googleapis.com/auth/youtube.upload",
                    "https://www.googleapis.com/auth/youtube.readonly",
                ],
                true,
                FlowKind::AuthorizationCode,
            ),
            Platform::Facebook => (
                "https://www.facebook.com/v19.0/dialog/oauth",
                "https://graph.facebook.com/v19.0/oauth/access_token",
                "https://graph.facebook.com/v19.0/me",
                Some("https://graph.facebook.com/v19.0/me/permissions"),
                vec!["public_profile", "email"],
                vec!["pages_show_list", "pages_manage_posts"],
                false,
                FlowKind::AuthorizationCode,
            ),
            Platform::Linkedin => (
                "https://www.linkedin.com/oauth/v2/authorization",
                "https://www.linkedin.com/oauth/v2/accessToken",
                "https://api.linkedin.com/v2/userinfo",
                None,
                vec!["openid", "profile", "email"],
                vec!["w_member_social"],
                false,
                FlowKind::AuthorizationCode,
            ),
            Platform::Twitter => (
                "https://api.twitter.com/oauth/authorize",
                "https://api.twitter.com/oauth/access_token",
                "https://api.twitter.com/1.1/account/verify_credentials.json",
                None,
                vec![],
                vec![],
                false,
                FlowKind::OAuth1,
            ),
            Platform::Instagram => (
                "https://api.instagram.com/oauth/authorize",
                "https://api.instagram.com/oauth/access_token",
                "https://graph.instagram.com/me",
                None,
                vec!["user_profile", "user_media"],
                vec![],
                false,
                FlowKind::AuthorizationCode,
            ),
            Platform::Tiktok => (
                "https://www.tiktok.com/v2/auth/authorize/",
                "https://open.tiktokapis.com/v2/oauth/token/",
                "https://open.tiktokapis.com/v2/user/info/",
                Some("https://open.tiktokapis.com/v2/oauth/revoke/"),
                vec!["user.info.basic"],
                vec!["video.upload", "video.publish"],
                true,
                FlowKind::AuthorizationCode,
            ),
            Platform::Telegram => (
                "https://oauth.telegram.org/auth",
                "",
                "",
                None,
                vec![],
                vec![],
                false,
                FlowKind::Widget,
            ),
        };

    PlatformConfig {
        platform,
        client_id: String::new(),
        client_secret: String::new(),
        authorize_url: authorize_url.to_string(),
        token_url: token_url.to_string(),
        profile_url: profile_url.to_string(),
        revoke_url: revoke_url.map(str::to_string),
        scopes: scopes.into_iter().map(str::to_string).collect(),
        business_scopes: business_scopes.into_iter().map(str::to_string).collect(),
        uses_pkce,
        flow,
        redirect_uri: None,
    }
}
