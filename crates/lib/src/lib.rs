//!
//! Mirrordoc: in-memory containers that mirror every mutation to a remote document store.
//! This library provides mirrored mappings and sequences, the background writer that
//! applies their changes, and an in-memory store to run them against.
//!
//! ## Core Concepts
//!
//! Mirrordoc is built around several key concepts:
//!
//! * **Roots (`mirror::MirrorBuilder`)**: A mirrored container bound to one document (selected by a
//!   `store::Filter`) and one dotted field path inside it. Opening a root hydrates it from the store.
//! * **Nodes (`mirror::MirrorMap`, `mirror::MirrorSeq`)**: Mappings and sequences that behave like
//!   ordinary containers locally. Every mutation changes local state first and then submits the
//!   equivalent remote update. Nested containers become child nodes sharing their root's binding.
//! * **Write dispatcher (`dispatch::WriteDispatcher`)**: A background worker that runs submitted
//!   writes strictly in order per ordering key, concurrently across keys, and reports outcomes to an
//!   observer and a bounded recent-results feed.
//! * **Document stores (`store::DocumentStore`)**: The remote collection interface. `store::InMemory`
//!   implements it for tests, demos and single-process use.

pub mod clock;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod mirror;
pub mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use config::MirrorConfig;
/// Re-export the node types for easier access.
pub use mirror::{Codec, Item, MirrorBuilder, MirrorMap, MirrorSeq, Slice};

/// Result type used throughout the Mirrordoc library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Mirrordoc library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured errors from a document store operation
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured errors from the write dispatcher
    #[error(transparent)]
    Dispatch(dispatch::DispatchError),

    /// Structured errors from mirrored nodes and the root builder
    #[error(transparent)]
    Mirror(mirror::MirrorError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Store(_) => "store",
            Error::Dispatch(_) => "dispatch",
            Error::Mirror(_) => "mirror",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a key, value or document was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            Error::Mirror(mirror_err) => mirror_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is type-related.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Mirror(mirror_err) => mirror_err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error is an index, capacity or slice violation.
    pub fn is_bounds_error(&self) -> bool {
        match self {
            Error::Mirror(mirror_err) => mirror_err.is_bounds_error(),
            _ => false,
        }
    }

    /// Check if a root was opened without a store, filter or path.
    pub fn is_missing_binding(&self) -> bool {
        match self {
            Error::Mirror(mirror_err) => mirror_err.is_missing_binding(),
            _ => false,
        }
    }

    /// Check if this error reports a failed background write.
    pub fn is_write_failure(&self) -> bool {
        match self {
            Error::Dispatch(dispatch_err) => dispatch_err.is_write_failure(),
            _ => false,
        }
    }

    /// Check if this error means the write dispatcher is shut down.
    pub fn is_closed(&self) -> bool {
        match self {
            Error::Dispatch(dispatch_err) => dispatch_err.is_closed(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Store(store_err) => store_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error is store-related.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
