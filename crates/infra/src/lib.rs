//! # PostBridge Infra
//!
//! Infrastructure adapters behind the `postbridge-core` ports:
//! - SQLite-backed token vault and credential store
//! - In-memory TTL state store
//! - Per-platform protocol adapters (OAuth2, OAuth1, widget-signed)
//! - Environment-driven configuration

pub mod adapters;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod state_store;
pub mod vault;

pub use config::Settings;
pub use database::DbManager;
pub use state_store::InMemoryStateStore;
pub use vault::TokenVault;
