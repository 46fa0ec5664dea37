//! Session error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! Only `login`/`register` (and the authenticated helpers) surface these to
//! callers. Background session checks swallow them and fall back to the
//! cached user or a logged-out state.

use crate::storage::StorageError;

/// Errors produced by session operations and backend calls.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend rejected the credentials or registration data.
    /// Carries the backend's own message, or a generic fallback.
    #[error("{0}")]
    Credential(String),

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Parse(String),

    /// No bearer token is available for an authenticated call.
    #[error("not logged in")]
    MissingToken,

    /// The token store could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl SessionError {
    /// Human-readable message suitable for an inline form error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Credential(message) => message.clone(),
            Self::Network(_) => "Network error. Please check your connection and try again.".to_owned(),
            Self::MissingToken => "Please log in to continue.".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
