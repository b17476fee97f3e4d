//! Identity client error types.

use thiserror::Error;

/// Failures talking to an identity verification API. Never returned to
/// callers of [`crate::IdentityClient`]; they are folded into an
/// [`crate::IdentityCheck`] with `is_valid = false`.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("HTTP error! Status: {status}")]
    Api { status: u16 },

    /// Base URL or API key missing from configuration.
    #[error("{0} API credentials are not configured")]
    NotConfigured(&'static str),

    /// The number failed the local format check.
    #[error("{0} must be exactly 11 digits")]
    InvalidFormat(&'static str),
}
