//! Repository trait definitions for the domain layer.
//!
//! Traits define the storage contract; implementations live in
//! `crate::infrastructure::persistence`. A mock of [`UrlStore`] is generated
//! via `mockall` for tests.
//!
//! # Available Traits
//!
//! - [`UrlStore`] - Short URL persistence and batch operations
//! - [`HealthCheck`] - Optional liveness capability

pub mod url_store;

pub use url_store::{HealthCheck, UrlStore};

#[cfg(test)]
pub use url_store::MockUrlStore;
