//! Instagram adapter.
//!
//! The basic-display exchange yields a short-lived token, upgraded to a
//! long-lived one (~60 days). Long-lived tokens refresh themselves: the
//! access token doubles as the refresh credential, so the stored refresh
//! token is a copy of the access token.

use async_trait::async_trait;
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};

use super::oauth2::{build_auth_url, get_profile_json, json_str, post_token_form, refresh_error};

const GRAPH_BASE: &str = "https://graph.instagram.com";

pub struct InstagramAdapter {
    client: reqwest::Client,
    graph_base: String,
}

impl InstagramAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, graph_base: GRAPH_BASE.to_string() }
    }

    #[cfg(test)]
    pub fn with_graph_base(client: reqwest::Client, graph_base: String) -> Self {
        Self { client, graph_base }
    }

    async fn get_token_json(&self, url: &str) -> Result<serde_json::Value> {
        let response =
            self.client.get(url).send().await.map_err(|e| ConnectError::Network(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ConnectError::Network(e.to_string()))?;
        if status.is_server_error() {
            return Err(ConnectError::Network(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(ConnectError::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| ConnectError::TokenExchange(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        let url = build_auth_url(&request, "client_id", &[])?;
        Ok(AuthUrl { url, request_token_secret: None })
    }

    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet> {
        let short = post_token_form(
            &self.client,
            &request.config.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", request.code),
                ("client_id", &request.config.client_id),
                ("client_secret", &request.config.client_secret),
                ("redirect_uri", request.redirect_uri),
            ],
        )
        .await?;

        let url = format!(
            "{}/access_token?grant_type=ig_exchange_token&client_secret={}&access_token={}",
            self.graph_base,
            urlencoding::encode(&request.config.client_secret),
            urlencoding::encode(&short.access_token)
        );
        let long = self.get_token_json(&url).await?;
        let access_token = json_str(&long, "access_token").ok_or_else(|| {
            ConnectError::TokenExchange("long-lived token response missing access_token".into())
        })?;
        let expires_in = long["expires_in"].as_i64();

        Ok(TokenSet::new(access_token.clone(), Some(access_token), expires_in, short.scope))
    }

    async fn fetch_profile(
        &self,
        config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let url = format!(
            "{}?fields=id,username&access_token={}",
            config.profile_url,
            urlencoding::encode(access_token)
        );
        let body = get_profile_json(&self.client, &url, None).await?;
        let external_id = json_str(&body, "id")
            .ok_or_else(|| ConnectError::ProfileFetch("instagram profile missing id".into()))?;
        Ok(SocialProfile {
            external_id,
            display_name: json_str(&body, "username"),
            avatar_url: None,
        })
    }

    async fn refresh_token(
        &self,
        _config: &PlatformConfig,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        let url = format!(
            "{}/refresh_access_token?grant_type=ig_refresh_token&access_token={}",
            self.graph_base,
            urlencoding::encode(refresh_token)
        );
        let body = self.get_token_json(&url).await.map_err(refresh_error)?;
        let access_token = json_str(&body, "access_token").ok_or_else(|| {
            ConnectError::TokenRefresh("refresh response missing access_token".into())
        })?;
        let expires_in = body["expires_in"].as_i64();
        Ok(TokenSet::new(access_token.clone(), Some(access_token), expires_in, None))
    }

    async fn revoke_token(&self, _config: &PlatformConfig, _access_token: &str) -> Result<()> {
        // No revocation endpoint; the user removes app access on Instagram.
        Ok(())
    }
}
