//! # offpeak-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`OptionsStore`](offpeak_app::ports::OptionsStore) port
//! - Manage the `SQLite` connection pool lifecycle
//! - Run the embedded migrations
//!
//! ## Dependency rule
//! Depends on `offpeak-app` (for port traits) and `offpeak-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod options_store;
pub mod pool;

pub use error::StorageError;
pub use options_store::SqliteOptionsStore;
pub use pool::{Config, Database};
