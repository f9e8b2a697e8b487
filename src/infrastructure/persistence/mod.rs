//! Store backend implementations.
//!
//! # Backends
//!
//! - [`FileUrlStore`] - In-memory records mirrored to a JSON-lines journal
//! - [`PgUrlStore`] - PostgreSQL table with upsert-based conflict detection

pub mod file_url_store;
pub mod pg_url_store;

pub use file_url_store::FileUrlStore;
pub use pg_url_store::PgUrlStore;
