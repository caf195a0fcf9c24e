//! Domain types for the OAuth connection subsystem.

mod connection;
mod platform;
mod state;

pub use connection::{ConnectionStatus, SocialProfile, TokenRecord, TokenSet};
pub use platform::{FlowKind, Platform, PlatformConfig, UserPlatformCredentials};
pub use state::StateData;
