//! Infrastructure error types and conversions into the domain error.

use postbridge_domain::ConnectError;
use thiserror::Error;

/// Errors raised inside the infrastructure layer before they cross the
/// port boundary.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("crypto error: {0}")]
    Crypto(#[from] postbridge_common::CommonError),
}

impl From<InfraError> for ConnectError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Sqlite(e) => ConnectError::Database(e.to_string()),
            InfraError::Pool(e) => ConnectError::Database(e.to_string()),
            // reqwest only surfaces transport-level failures here; HTTP
            // error statuses are mapped by the adapters themselves.
            InfraError::Http(e) => ConnectError::Network(e.to_string()),
            InfraError::Join(e) => ConnectError::Internal(e.to_string()),
            InfraError::Crypto(e) => ConnectError::Internal(e.to_string()),
        }
    }
}

/// Map a blocking-task join failure at the repository boundary.
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> ConnectError {
    ConnectError::Internal(format!("database task panicked: {err}"))
}
