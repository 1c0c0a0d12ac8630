//! Error types for document store operations.
//!
//! These errors describe failures of a single remote operation. They travel
//! back from the background writer wrapped in a
//! [`MirrorWriteError`](crate::dispatch::MirrorWriteError), or surface
//! directly from hydration when a root is opened.

use thiserror::Error;

/// Errors that can occur while talking to a document store.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document matched the filter and the operation does not upsert.
    #[error("No document matches filter {filter}")]
    DocumentNotFound {
        /// The filter that matched nothing, rendered as JSON
        filter: String,
    },

    /// A path traverses or targets a value of the wrong shape.
    #[error("Path conflict at '{path}': {reason}")]
    PathConflict {
        /// The offending dot-delimited path
        path: String,
        /// Why the path cannot be applied
        reason: String,
    },

    /// A path string could not be parsed.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why it is invalid
        reason: String,
    },

    /// The store rejected the operation for a backend-specific reason.
    #[error("Store backend failure: {reason}")]
    Backend {
        /// Description supplied by the backend
        reason: String,
    },

    /// The unit of work running the operation was aborted before finishing.
    #[error("Store operation aborted: {reason}")]
    Aborted {
        /// Why the operation did not complete
        reason: String,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Check if this error indicates a document was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::DocumentNotFound { .. })
    }

    /// Check if this error was caused by a malformed or conflicting path.
    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            StoreError::PathConflict { .. } | StoreError::InvalidPath { .. }
        )
    }

    /// Check if this error is related to I/O or (de)serialization.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StoreError::FileIo { .. }
                | StoreError::SerializationFailed { .. }
                | StoreError::DeserializationFailed { .. }
        )
    }

    /// Get the path if this error is about a specific path.
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreError::PathConflict { path, .. } | StoreError::InvalidPath { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    pub(crate) fn conflict(path: &str, reason: impl Into<String>) -> Self {
        StoreError::PathConflict {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
