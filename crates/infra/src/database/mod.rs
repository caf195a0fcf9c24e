//! SQLite persistence: pool management and the credentials repository.
//!
//! Token records live behind the vault (`crate::vault`), which owns the
//! encryption boundary.

mod credentials_repository;
mod manager;

pub use credentials_repository::SqliteCredentialsRepository;
pub use manager::DbManager;
