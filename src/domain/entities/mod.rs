//! Core domain entities.
//!
//! - [`UrlRecord`] - A persisted short URL mapping
//! - [`BatchItem`] / [`BatchResult`] - Bulk-create request and response entries

pub mod url_record;

pub use url_record::{BatchItem, BatchResult, Resolution, UrlRecord};
