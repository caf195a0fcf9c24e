//! # PostBridge Common
//!
//! Foundation utilities shared across the workspace:
//! - OAuth state/PKCE generation (`auth`)
//! - AES-256-GCM token encryption with versioned keys (`crypto`)
//!
//! This crate performs no I/O and carries no business meaning.

pub mod auth;
pub mod crypto;
pub mod error;

pub use error::{CommonError, CommonResult};
