//! # PostBridge API
//!
//! HTTP surface of the connection subsystem: the OAuth redirect
//! endpoints and disconnect, mapped onto `postbridge-core` services.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
