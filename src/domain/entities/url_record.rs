//! URL record entity and the batch request/response items.

use serde::{Deserialize, Serialize};

/// A shortened URL owned by one principal.
///
/// Records are never removed; `is_deleted` only ever goes from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Sequence number within the store instance (1-based).
    pub uuid: i64,
    pub correlation_id: Option<String>,
    /// The short code, or the fully qualified short URL in listings.
    pub short_code: String,
    pub original_url: String,
    pub owner_id: String,
    pub is_deleted: bool,
}

impl UrlRecord {
    pub fn new(
        uuid: i64,
        short_code: String,
        original_url: String,
        owner_id: String,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            uuid,
            correlation_id,
            short_code,
            original_url,
            owner_id,
            is_deleted: false,
        }
    }

    /// How a lookup of this record should be answered.
    pub fn resolution(&self) -> Resolution<'_> {
        if self.is_deleted {
            Resolution::Gone
        } else {
            Resolution::Redirect(&self.original_url)
        }
    }
}

/// Result of resolving a found record.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Redirect(&'a str),
    Gone,
}

/// One entry of a bulk-create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

impl BatchItem {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// One entry of a bulk-create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
    /// True when the item resolved to a record that already existed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub existing: bool,
}
