//! # PostBridge Domain
//!
//! Pure types and the error taxonomy for the OAuth connection subsystem.
//! No I/O, no async, no third-party service knowledge beyond the closed
//! set of supported platforms.

pub mod constants;
pub mod errors;
pub mod types;

pub use errors::{ConnectError, Result};
pub use types::{
    ConnectionStatus, FlowKind, Platform, PlatformConfig, SocialProfile, StateData, TokenRecord,
    TokenSet, UserPlatformCredentials,
};
