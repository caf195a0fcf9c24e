//! TikTok adapter.
//!
//! The v2 open API renames `client_id` to `client_key` everywhere and
//! wraps the user profile in a `data.user` envelope.

use async_trait::async_trait;
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};

use super::oauth2::{build_auth_url, json_str, post_token_form, refresh_error};

pub struct TiktokAdapter {
    client: reqwest::Client,
}

impl TiktokAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformAdapter for TiktokAdapter {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        let url = build_auth_url(&request, "client_key", &[])?;
        Ok(AuthUrl { url, request_token_secret: None })
    }

    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet> {
        let verifier = request.state_data.pkce_verifier.as_deref().ok_or_else(|| {
            ConnectError::PkceVerification("missing PKCE verifier for tiktok exchange".into())
        })?;

        let response = post_token_form(
            &self.client,
            &request.config.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", request.code),
                ("client_key", &request.config.client_id),
                ("client_secret", &request.config.client_secret),
                ("redirect_uri", request.redirect_uri),
                ("code_verifier", verifier),
            ],
        )
        .await?;
        Ok(response.into())
    }

    async fn fetch_profile(
        &self,
        config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let url = format!("{}?fields=open_id,display_name,avatar_url", config.profile_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectError::ProfileFetch(format!(
                "profile endpoint returned {status}: {body}"
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConnectError::ProfileFetch(format!("malformed profile: {e}")))?;

        let user = &body["data"]["user"];
        let external_id = json_str(user, "open_id")
            .ok_or_else(|| ConnectError::ProfileFetch("tiktok profile missing open_id".into()))?;
        Ok(SocialProfile {
            external_id,
            display_name: json_str(user, "display_name"),
            avatar_url: json_str(user, "avatar_url"),
        })
    }

    async fn refresh_token(
        &self,
        config: &PlatformConfig,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        let response = post_token_form(
            &self.client,
            &config.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_key", &config.client_id),
                ("client_secret", &config.client_secret),
            ],
        )
        .await
        .map_err(refresh_error)?;
        Ok(response.into())
    }

    async fn revoke_token(&self, config: &PlatformConfig, access_token: &str) -> Result<()> {
        let Some(revoke_url) = config.revoke_url.as_deref() else {
            return Ok(());
        };
        let response = self
            .client
            .post(revoke_url)
            .form(&[
                ("client_key", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
                ("token", access_token),
            ])
            .send()
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ConnectError::Network(format!(
                "revoke endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
