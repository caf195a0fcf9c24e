//! Twitter adapter: OAuth1 three-legged flow.
//!
//! OAuth1 has no client-side state parameter, so the issued state rides
//! on the callback URL as a query parameter, and the request-token secret
//! is parked in the state entry until the exchange leg needs it for
//! signing. The callback handler folds `oauth_token` and `oauth_verifier`
//! into a composite code (`token:verifier`); the exchanged credentials
//! are stored the same way (`token:secret`) since every signed API call
//! needs both halves.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use postbridge_core::ports::{AuthRequest, AuthUrl, ExchangeRequest, PlatformAdapter};
use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result, SocialProfile, TokenSet};
use rand::RngCore;
use sha1::Sha1;
use url::Url;

use super::oauth2::json_str;

const REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";

pub struct TwitterAdapter {
    client: reqwest::Client,
    request_token_url: String,
}

impl TwitterAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, request_token_url: REQUEST_TOKEN_URL.to_string() }
    }

    #[cfg(test)]
    pub fn with_request_token_url(client: reqwest::Client, request_token_url: String) -> Self {
        Self { client, request_token_url }
    }

    /// Signed POST returning the provider's form-encoded body.
    async fn signed_post(
        &self,
        url: &str,
        config: &PlatformConfig,
        oauth_params: &[(&str, &str)],
        token_secret: &str,
    ) -> Result<BTreeMap<String, String>> {
        let header = authorization_header(
            "POST",
            url,
            &config.client_id,
            &config.client_secret,
            oauth_params,
            token_secret,
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ConnectError::Network(e.to_string()))?;
        if status.is_server_error() {
            return Err(ConnectError::Network(format!(
                "oauth1 endpoint returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(ConnectError::TokenExchange(format!(
                "oauth1 endpoint returned {status}: {body}"
            )));
        }

        Ok(parse_form_body(&body))
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn build_auth_url(&self, request: AuthRequest) -> Result<AuthUrl> {
        // State has no slot in the OAuth1 redirect, so it travels on the
        // callback URL.
        let mut callback = Url::parse(&request.redirect_uri)
            .map_err(|e| ConnectError::Config(format!("bad redirect URI: {e}")))?;
        callback.query_pairs_mut().append_pair("state", &request.state);

        let fields = self
            .signed_post(
                &self.request_token_url,
                &request.config,
                &[("oauth_callback", callback.as_str())],
                "",
            )
            .await?;

        let oauth_token = fields.get("oauth_token").ok_or_else(|| {
            ConnectError::TokenExchange("request token response missing oauth_token".into())
        })?;
        let secret = fields.get("oauth_token_secret").ok_or_else(|| {
            ConnectError::TokenExchange("request token response missing oauth_token_secret".into())
        })?;

        let url = format!(
            "{}?oauth_token={}",
            request.config.authorize_url,
            percent_encode(oauth_token)
        );
        Ok(AuthUrl { url, request_token_secret: Some(secret.clone()) })
    }

    async fn exchange_code(&self, request: ExchangeRequest<'_>) -> Result<TokenSet> {
        let (oauth_token, verifier) = request.code.split_once(':').ok_or_else(|| {
            ConnectError::TokenExchange(
                "twitter exchange expects an oauth_token:oauth_verifier pair".into(),
            )
        })?;
        let request_secret =
            request.state_data.request_token_secret.as_deref().ok_or_else(|| {
                ConnectError::StateVerification(
                    "no request token secret stored for this state".into(),
                )
            })?;

        let fields = self
            .signed_post(
                &request.config.token_url,
                request.config,
                &[("oauth_token", oauth_token), ("oauth_verifier", verifier)],
                request_secret,
            )
            .await?;

        let token = fields.get("oauth_token").ok_or_else(|| {
            ConnectError::TokenExchange("access token response missing oauth_token".into())
        })?;
        let secret = fields.get("oauth_token_secret").ok_or_else(|| {
            ConnectError::TokenExchange("access token response missing oauth_token_secret".into())
        })?;

        // OAuth1 credentials do not expire and are not refreshable.
        Ok(TokenSet {
            access_token: format!("{token}:{secret}"),
            refresh_token: None,
            token_type: "OAuth1".to_string(),
            expires_at: None,
            scope: None,
        })
    }

    async fn fetch_profile(
        &self,
        config: &PlatformConfig,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let (token, secret) = access_token.split_once(':').ok_or_else(|| {
            ConnectError::ProfileFetch("twitter credentials are not a token:secret pair".into())
        })?;

        let header = authorization_header(
            "GET",
            &config.profile_url,
            &config.client_id,
            &config.client_secret,
            &[("oauth_token", token)],
            secret,
        );

        let response = self
            .client
            .get(&config.profile_url)
            .header("Authorization", header)
            .send()
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(ConnectError::Network(format!(
                    "profile endpoint returned {status}: {body}"
                )));
            }
            return Err(ConnectError::ProfileFetch(format!(
                "profile endpoint returned {status}: {body}"
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConnectError::ProfileFetch(format!("malformed profile: {e}")))?;

        let external_id = json_str(&body, "id_str")
            .or_else(|| json_str(&body, "id"))
            .ok_or_else(|| ConnectError::ProfileFetch("twitter profile missing id".into()))?;
        Ok(SocialProfile {
            external_id,
            display_name: json_str(&body, "screen_name").or_else(|| json_str(&body, "name")),
            avatar_url: json_str(&body, "profile_image_url_https"),
        })
    }

    async fn refresh_token(
        &self,
        _config: &PlatformConfig,
        _refresh_token: &str,
    ) -> Result<TokenSet> {
        Err(ConnectError::TokenRefresh("oauth1 credentials do not expire".into()))
    }

    async fn revoke_token(&self, _config: &PlatformConfig, _access_token: &str) -> Result<()> {
        // Revocation happens on the Twitter side; local revocation is
        // sufficient.
        Ok(())
    }
}

/// Build an OAuth1 `Authorization` header for one request.
fn authorization_header(
    method: &str,
    url: &str,
    consumer_key: &str,
    consumer_secret: &str,
    extra_params: &[(&str, &str)],
    token_secret: &str,
) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = generate_nonce();

    let mut params: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), consumer_key.into()),
        ("oauth_nonce".into(), nonce),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp),
        ("oauth_version".into(), "1.0".into()),
    ];
    for (key, value) in extra_params {
        params.push(((*key).into(), (*value).into()));
    }

    let signature = sign(method, url, &params, consumer_secret, token_secret);
    params.push(("oauth_signature".into(), signature));

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {fields}")
}

/// HMAC-SHA1 signature over the normalized request per RFC 5849.
fn sign(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    // Parameters sorted by encoded name then encoded value.
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let param_string =
        encoded.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!("{}&{}", percent_encode(consumer_secret), percent_encode(token_secret));

    let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(base_string.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// RFC 3986 percent encoding, the strict variant OAuth1 requires.
fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn parse_form_body(body: &str) -> BTreeMap<String, String> {
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            (
                urlencoding::decode(k).map(|s| s.into_owned()).unwrap_or_else(|_| k.to_string()),
                urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.to_string()),
            )
        })
        .collect()
}
