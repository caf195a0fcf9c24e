//! Cryptographic primitives for token encryption at rest.

pub mod encryption;

pub use encryption::{EncryptedData, EncryptionService};
