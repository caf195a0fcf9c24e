//! # PostBridge Core
//!
//! Business logic of the OAuth connection subsystem:
//! - Platform registry (config + adapter resolution, per-user overrides)
//! - Authorization URL builder and code exchange engine
//! - Token rotation manager
//!
//! ## Architecture
//! - Defines port traits implemented by `postbridge-infra`
//! - Depends only on `postbridge-domain` and `postbridge-common`
//! - Contains no I/O of its own; everything impure arrives via ports

pub mod connection;
pub mod ports;
pub mod registry;
pub mod retry;
pub mod rotation;

pub use connection::{AuthorizationUrl, ConnectionOutcome, ConnectionService};
pub use ports::{
    AuthRequest, AuthUrl, ConnectionRepository, CredentialsRepository, ExchangeRequest,
    PlatformAdapter, StateStore,
};
pub use registry::PlatformRegistry;
pub use rotation::TokenRotationManager;
