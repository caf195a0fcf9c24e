//! Facebook adapter.
//!
//! Facebook issues no refresh tokens. The short-lived code-exchange token
//! is upgraded to a long-lived one (~60 days) immediately; once that
//! expires the user reconnects.

use async_trait::async_trait;
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};
use tracing::debug;

use super::oauth2::{build_auth_url, get_profile_json, json_str, post_token_form};

pub struct FacebookAdapter {
    client: reqwest::Client,
}

impl FacebookAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
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
                ("code", request.code),
                ("client_id", &request.config.client_id),
                ("client_secret", &request.config.client_secret),
                ("redirect_uri", request.redirect_uri),
            ],
        )
        .await?;

        // Upgrade to a long-lived token in the same flow.
        let long = post_token_form(
            &self.client,
            &request.config.token_url,
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", &request.config.client_id),
                ("client_secret", &request.config.client_secret),
                ("fb_exchange_token", &short.access_token),
            ],
        )
        .await;

        match long {
            Ok(long) => Ok(long.into()),
            Err(err) => {
                debug!(error = %err, "long-lived token upgrade failed, keeping short-lived token");
                Ok(short.into())
            }
        }
    }

    async fn fetch_profile(
        &self,
        config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let url = format!(
            "{}?fields=id,name,picture&access_token={}",
            config.profile_url,
            urlencoding::encode(access_token)
        );
        let body = get_profile_json(&self.client, &url, None).await?;
        let external_id = json_str(&body, "id")
            .ok_or_else(|| ConnectError::ProfileFetch("facebook profile missing id".into()))?;
        let avatar_url = body["picture"]["data"]["url"].as_str().map(str::to_string);
        Ok(SocialProfile { external_id, display_name: json_str(&body, "name"), avatar_url })
    }

    async fn refresh_token(
        &self,
        _config: &PlatformConfig,
        _refresh_token: &str,
    ) -> Result<TokenSet> {
        Err(ConnectError::TokenRefresh(
            "facebook tokens cannot be refreshed; reconnect the account".into(),
        ))
    }

    async fn revoke_token(&self, config: &PlatformConfig, access_token: &str) -> Result<()> {
        let Some(revoke_url) = config.revoke_url.as_deref() else {
            return Ok(());
        };
        // DELETE /me/permissions de-authorizes the app.
        let response = self
            .client
            .delete(revoke_url)
            .query(&[("access_token", access_token)])
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
