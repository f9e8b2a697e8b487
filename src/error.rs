//! Error taxonomy shared by every store backend and the batch coordinator.
//!
//! Callers that present results over some transport (HTTP handlers, the CLI)
//! use [`classify`] to decide between a conflict outcome and a generic
//! failure instead of matching on variants themselves.

use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The submitted URL is malformed, relative, or uses an unsupported scheme.
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    /// The URL was already shortened for this owner.
    ///
    /// Not a failure: `short_url` is the fully qualified URL of the existing record.
    #[error("Original URL already exists with short URL: {short_url}")]
    Conflict { short_url: String },

    /// File, serialization, or database failure.
    #[error("{message}")]
    Storage { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(short_url: impl Into<String>) -> Self {
        Self::Conflict {
            short_url: short_url.into(),
        }
    }
    pub fn storage(message: impl Into<String>, details: Value) -> Self {
        Self::Storage {
            message: message.into(),
            details,
        }
    }

    /// Details attached to the error, `null` for conflicts.
    pub fn details(&self) -> &Value {
        match self {
            AppError::Validation { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Storage { details, .. } => details,
            AppError::Conflict { .. } => &Value::Null,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        map_sqlx_error(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::storage("Journal I/O error", json!({ "reason": e.to_string() }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::storage(
            "Malformed journal entry",
            json!({ "reason": e.to_string(), "line": e.line() }),
        )
    }
}

pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
    {
        return AppError::storage(
            "Unique constraint violation",
            json!({ "constraint": db.constraint() }),
        );
    }

    AppError::storage("Database error", json!({ "reason": e.to_string() }))
}

/// Outcome category a presentation layer maps to a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Conflict,
    ServerError,
}

impl StatusCategory {
    pub fn status_code(self) -> u16 {
        match self {
            StatusCategory::Conflict => 409,
            StatusCategory::ServerError => 500,
        }
    }
}

/// Splits an error into the message to show and its outcome category.
///
/// A conflict yields the existing short URL; anything else yields the error
/// text and is treated as a server-side fault.
pub fn classify(err: &AppError) -> (String, StatusCategory) {
    match err {
        AppError::Conflict { short_url } => (short_url.clone(), StatusCategory::Conflict),
        other => (other.to_string(), StatusCategory::ServerError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_conflict_returns_existing_url() {
        let err = AppError::conflict("http://localhost:8080/abcdEFGH");

        let (message, category) = classify(&err);

        assert_eq!(message, "http://localhost:8080/abcdEFGH");
        assert_eq!(category, StatusCategory::Conflict);
        assert_eq!(category.status_code(), 409);
    }

    #[test]
    fn test_classify_storage_error_is_server_error() {
        let err = AppError::storage("Database error", json!({}));

        let (message, category) = classify(&err);

        assert_eq!(message, "Database error");
        assert_eq!(category, StatusCategory::ServerError);
        assert_eq!(category.status_code(), 500);
    }

    #[test]
    fn test_classify_validation_error_is_server_error() {
        let err = AppError::bad_request("Invalid URL: nope", json!({ "url": "nope" }));

        let (message, category) = classify(&err);

        assert_eq!(message, "Invalid URL: nope");
        assert_eq!(category, StatusCategory::ServerError);
    }

    #[test]
    fn test_conflict_display_mentions_short_url() {
        let err = AppError::conflict("http://s.test/xyz");
        assert!(err.to_string().contains("http://s.test/xyz"));
        assert!(err.details().is_null());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();

        assert!(matches!(err, AppError::Storage { .. }));
        assert_eq!(err.details()["reason"], "denied");
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_storage() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
