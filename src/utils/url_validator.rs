//! Original URL validation.
//!
//! Stores accept only absolute `http`/`https` URLs with a host. The URL is
//! stored exactly as submitted; validation never rewrites it.

use serde_json::json;
use url::Url;

use crate::error::AppError;

/// Reasons a submitted URL is rejected.
#[derive(Debug, thiserror::Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("URL has no host")]
    MissingHost,
}

/// Checks that `input` is an absolute `http`/`https` URL with a host.
///
/// # Errors
///
/// Returns [`UrlValidationError::InvalidFormat`] for relative or malformed input,
/// [`UrlValidationError::UnsupportedProtocol`] for schemes like `javascript:` or `ftp:`.
pub fn validate_url(input: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(input).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlValidationError::UnsupportedProtocol),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// [`validate_url`] lifted into [`AppError::Validation`].
pub fn ensure_valid_url(input: &str) -> Result<(), AppError> {
    validate_url(input).map(|_| ()).map_err(|e| {
        AppError::bad_request(
            format!("Invalid URL: {input}"),
            json!({ "url": input, "reason": e.to_string() }),
        )
    })
}
