//! HTTP error mapping.
//!
//! Every failure crosses this boundary as `{error, error_description}`.
//! The description carries the domain message, which never contains
//! token plaintext or client secrets.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use postbridge_domain::ConnectError;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

/// Wrapper turning domain errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub ConnectError);

impl From<ConnectError> for ApiError {
    fn from(err: ConnectError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, status = %status, "request rejected");
        }

        let body = ErrorBody { error: error_code(&self.0).to_string(), error_description: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

fn status_for(err: &ConnectError) -> StatusCode {
    match err {
        ConnectError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
        ConnectError::StateVerification(_) | ConnectError::PkceVerification(_) => {
            StatusCode::UNAUTHORIZED
        }
        ConnectError::TokenExchange(_) => StatusCode::BAD_REQUEST,
        ConnectError::Connection { duplicate: true, .. } => StatusCode::CONFLICT,
        ConnectError::Connection { .. } => StatusCode::BAD_REQUEST,
        ConnectError::TokenRefresh(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_code(err: &ConnectError) -> &'static str {
    match err {
        ConnectError::UnsupportedPlatform(_) => "unsupported_platform",
        ConnectError::StateVerification(_) => "state_verification_failed",
        ConnectError::PkceVerification(_) => "pkce_verification_failed",
        ConnectError::TokenExchange(_) => "token_exchange_failed",
        ConnectError::ProfileFetch(_) => "profile_fetch_failed",
        ConnectError::Connection { duplicate: true, .. } => "duplicate_connection",
        ConnectError::Connection { .. } => "connection_error",
        ConnectError::TokenRefresh(_) => "token_refresh_failed",
        ConnectError::Database(_) => "internal_error",
        ConnectError::Config(_) => "internal_error",
        ConnectError::Network(_) => "upstream_unavailable",
        ConnectError::Internal(_) => "internal_error",
    }
}
