//! Google / YouTube adapter.
//!
//! Standard authorization-code flow with PKCE. `access_type=offline` and
//! `prompt=consent` are required to receive a refresh token.

use async_trait::async_trait;
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};

use super::oauth2::{build_auth_url, get_profile_json, json_str, post_token_form, refresh_error};

pub struct GoogleAdapter {
    client: reqwest::Client,
}

impl GoogleAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformAdapter for GoogleAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        let url = build_auth_url(
            &request,
            "client_id",
            &[("access_type", "offline"), ("prompt", "consent")],
        )?;
        Ok(AuthUrl { url, request_token_secret: None })
    }

    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet> {
        let verifier = request.state_data.pkce_verifier.as_deref().ok_or_else(|| {
            ConnectError::PkceVerification("missing PKCE verifier for google exchange".into())
        })?;

        let response = post_token_form(
            &self.client,
            &request.config.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", request.code),
                ("client_id", &request.config.client_id),
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
        let body = get_profile_json(&self.client, &config.profile_url, Some(access_token)).await?;
        let external_id = json_str(&body, "id")
            .ok_or_else(|| ConnectError::ProfileFetch("google profile missing id".into()))?;
        Ok(SocialProfile {
            external_id,
            display_name: json_str(&body, "name").or_else(|| json_str(&body, "email")),
            avatar_url: json_str(&body, "picture"),
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
                ("client_id", &config.client_id),
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
            .form(&[("token", access_token)])
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
