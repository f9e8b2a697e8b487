//! Helpers shared by the store backends.
//!
//! - [`code_generator`] - Random short code generation
//! - [`url_validator`] - Absolute URL validation
//! - [`short_url`] - Base URL + code formatting
//! - [`db_error`] - PostgreSQL constraint inspection

pub mod code_generator;
pub mod db_error;
pub mod short_url;
pub mod url_validator;
