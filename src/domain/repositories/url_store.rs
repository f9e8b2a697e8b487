//! Storage contract for short URL records.

use crate::domain::entities::{BatchItem, BatchResult, UrlRecord};
use crate::error::AppError;
use async_trait::async_trait;

/// Persistence for short URLs, polymorphic over backends.
///
/// All short URLs returned by a store are fully qualified with the store's
/// base URL.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::FileUrlStore`] - In-memory with optional JSON-lines journal
/// - [`crate::infrastructure::persistence::PgUrlStore`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Prepares backend state. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on unrecoverable I/O or connection errors.
    async fn initialize(&self) -> Result<(), AppError>;

    /// Shortens `original_url` for `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the URL is not a valid absolute URL.
    ///
    /// Returns [`AppError::Conflict`] carrying the existing short URL if the
    /// owner already shortened this URL.
    ///
    /// Returns [`AppError::Storage`] on persistence errors.
    async fn save(&self, owner_id: &str, original_url: &str) -> Result<String, AppError>;

    /// Shortens every item, all or nothing.
    ///
    /// Every URL is validated before anything is written. Items whose URL the
    /// owner already shortened resolve to the existing short URL with
    /// `existing = true`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for the first invalid URL, with nothing persisted.
    ///
    /// Returns [`AppError::Storage`] on persistence errors, with nothing persisted.
    async fn save_batch(
        &self,
        owner_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, AppError>;

    /// Looks a record up by short code, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no record has this code.
    async fn get(&self, short_code: &str) -> Result<UrlRecord, AppError>;

    /// Lists the owner's records in creation order with `short_code`
    /// rewritten to the fully qualified short URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on persistence errors.
    async fn index(&self, owner_id: &str) -> Result<Vec<UrlRecord>, AppError>;

    /// Soft-deletes the given codes owned by `owner_id`.
    ///
    /// Codes that do not exist or belong to another owner are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] on persistence errors.
    async fn batch_delete(&self, owner_id: &str, short_codes: Vec<String>)
    -> Result<(), AppError>;
}

/// Liveness probe for backends that hold a connection worth checking.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;
}
