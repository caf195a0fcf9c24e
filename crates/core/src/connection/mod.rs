//! Connection flows: authorization URL issuance, code exchange, disconnect.

mod service;

pub use service::{AuthorizationUrl, ConnectionOutcome, ConnectionService};
