//! Error type for foundation utilities

use thiserror::Error;

/// Error type for common (non-domain) operations
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommonError {
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}

/// Result type alias for common operations
pub type CommonResult<T> = std::result::Result<T, CommonError>;
