//! Shared OAuth2 mechanics used by the authorization-code adapters.
//!
//! Providers differ in parameter names and response envelopes; the
//! request/response plumbing here is the common denominator. Nothing in
//! this module logs token values.

use postbridge_core::ports::AuthRequest;
use postbridge_domain::{ConnectError, Result, TokenSet};
use serde::Deserialize;
use url::Url;

/// Standard token endpoint response. Providers that wrap or rename
/// fields parse their own shape instead.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenSet {
    fn from(resp: TokenResponse) -> Self {
        TokenSet::new(resp.access_token, resp.refresh_token, resp.expires_in, resp.scope)
    }
}

/// Build a standard authorization URL, with provider-specific extras
/// appended by the caller.
///
/// `client_id_param` covers providers that rename the parameter (TikTok
/// uses `client_key`).
pub fn build_auth_url(
    request: &AuthRequest,
    client_id_param: &str,
    extra: &[(&str, &str)],
) -> Result<String> {
    let mut url = Url::parse(&request.config.authorize_url)
        .map_err(|e| ConnectError::Config(format!("bad authorize_url: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(client_id_param, &request.config.client_id)
            .append_pair("redirect_uri", &request.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", &request.state);
        if !request.scope.is_empty() {
            query.append_pair("scope", &request.scope);
        }
        if let Some(pkce) = &request.pkce {
            query
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", pkce.method());
        }
        for (key, value) in extra {
            query.append_pair(key, value);
        }
    }

    Ok(url.to_string())
}

/// POST a form to a token endpoint and parse the standard response.
pub async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let value = post_form_json(client, token_url, form).await?;
    serde_json::from_value(value)
        .map_err(|e| ConnectError::TokenExchange(format!("malformed token response: {e}")))
}

/// POST a form and return the raw JSON body. A provider 4xx is a
/// rejection and maps to the exchange error with the provider's error
/// text preserved; a 5xx is a transient outage and maps to a network
/// error so retry and fallback layers treat it as such.
pub async fn post_form_json(
    client: &reqwest::Client,
    url: &str,
    form: &[(&str, &str)],
) -> Result<serde_json::Value> {
    let response = client
        .post(url)
        .form(form)
        .send()
        .await
        .map_err(|e| ConnectError::Network(e.to_string()))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ConnectError::Network(e.to_string()))?;

    if status.is_server_error() {
        return Err(ConnectError::Network(format!("token endpoint returned {status}: {body}")));
    }
    if !status.is_success() {
        return Err(ConnectError::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| ConnectError::TokenExchange(format!("malformed token response: {e}")))
}

/// GET a JSON resource with a bearer token. A 4xx maps to the
/// profile-fetch error; a 5xx maps to a network error so the caller's
/// single retry applies.
pub async fn get_profile_json(
    client: &reqwest::Client,
    url: &str,
    access_token: Option<&str>,
) -> Result<serde_json::Value> {
    let mut request = client.get(url);
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.map_err(|e| ConnectError::Network(e.to_string()))?;

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

    response.json().await.map_err(|e| ConnectError::ProfileFetch(format!("malformed profile: {e}")))
}

/// Refresh calls reuse the token endpoint; a rejection there is a
/// refresh failure, not an exchange failure.
pub fn refresh_error(err: ConnectError) -> ConnectError {
    match err {
        ConnectError::TokenExchange(msg) => ConnectError::TokenRefresh(msg),
        other => other,
    }
}

/// Pull a string field out of a JSON object, tolerating numeric ids.
pub fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    match &value[key] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
