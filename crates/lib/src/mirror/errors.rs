//! Error types for mirrored containers.
//!
//! These are the local, synchronous failures of a mutating call: they are
//! raised before anything is written and leave the node unchanged, exactly
//! like the equivalent failure on a plain container would.

use thiserror::Error;

use crate::store::path::PathError;

/// Errors raised by [`MirrorMap`](super::MirrorMap),
/// [`MirrorSeq`](super::MirrorSeq) and [`MirrorBuilder`](super::MirrorBuilder).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A required construction argument was not supplied.
    #[error("Missing required binding: {binding}")]
    MissingBinding {
        /// Name of the missing binding: `store`, `filter` or `path`
        binding: &'static str,
    },

    /// The stored value has a different shape than the requested node.
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Root path that was opened
        path: String,
        /// Requested container kind
        expected: &'static str,
        /// Kind of the stored value
        found: &'static str,
    },

    /// A map key is absent.
    #[error("Key '{key}' not found in '{path}'")]
    KeyNotFound {
        /// Path of the map
        path: String,
        /// The missing key
        key: String,
    },

    /// No sequence element equals the value passed to `remove`.
    #[error("Value not found in '{path}'")]
    ValueNotFound {
        /// Path of the sequence
        path: String,
    },

    /// A sequence index is outside the current bounds.
    #[error("Index {index} out of range for '{path}' of length {len}")]
    IndexOutOfRange {
        /// Path of the sequence
        path: String,
        /// The requested index, before normalization
        index: isize,
        /// Length at the time of the call
        len: usize,
    },

    /// `pop_item` on an empty map.
    #[error("Pop item from empty map '{path}'")]
    EmptyMap {
        /// Path of the map
        path: String,
    },

    /// Popping from an empty sequence.
    #[error("Pop from empty sequence '{path}'")]
    EmptySequence {
        /// Path of the sequence
        path: String,
    },

    /// Inserting into a bounded sequence that is already full.
    #[error("Sequence '{path}' is at its maximum size of {capacity}")]
    CapacityExceeded {
        /// Path of the sequence
        path: String,
        /// The bound
        capacity: usize,
    },

    /// Assigning a sequence of the wrong size to an extended slice.
    #[error("Attempt to assign sequence of size {given} to extended slice of size {expected}")]
    SliceLengthMismatch {
        /// Number of targeted positions
        expected: usize,
        /// Number of values supplied
        given: usize,
    },

    /// A slice with step zero.
    #[error("Slice step cannot be zero")]
    InvalidSlice,

    /// A map key is not usable as a path segment.
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] PathError),
}

impl MirrorError {
    /// Check if this error reports an absent key or value.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MirrorError::KeyNotFound { .. }
                | MirrorError::ValueNotFound { .. }
                | MirrorError::EmptyMap { .. }
        )
    }

    /// Check if this error reports a stored value of the wrong shape.
    pub fn is_type_error(&self) -> bool {
        matches!(self, MirrorError::TypeMismatch { .. })
    }

    /// Check if this error reports a missing construction argument.
    pub fn is_missing_binding(&self) -> bool {
        matches!(self, MirrorError::MissingBinding { .. })
    }

    /// Check if this error is about sequence positions or bounds.
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self,
            MirrorError::IndexOutOfRange { .. }
                | MirrorError::EmptySequence { .. }
                | MirrorError::CapacityExceeded { .. }
                | MirrorError::SliceLengthMismatch { .. }
                | MirrorError::InvalidSlice
        )
    }

    /// Get the node path this error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            MirrorError::TypeMismatch { path, .. }
            | MirrorError::KeyNotFound { path, .. }
            | MirrorError::ValueNotFound { path }
            | MirrorError::EmptyMap { path }
            | MirrorError::IndexOutOfRange { path, .. }
            | MirrorError::EmptySequence { path }
            | MirrorError::CapacityExceeded { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<MirrorError> for crate::Error {
    fn from(err: MirrorError) -> Self {
        crate::Error::Mirror(err)
    }
}
