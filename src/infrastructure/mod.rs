//! Infrastructure layer implementing the domain storage contract.
//!
//! # Modules
//!
//! - [`persistence`] - File-journal and PostgreSQL store backends

pub mod persistence;
