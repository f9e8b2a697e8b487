//! Domain layer containing entities and the storage contract.
//!
//! # Architecture
//!
//! - [`entities`] - Core data structures
//! - [`repositories`] - Storage trait definitions
//!
//! The domain layer has no dependency on concrete backends; the traits here
//! are implemented by [`crate::infrastructure::persistence`].

pub mod entities;
pub mod repositories;
