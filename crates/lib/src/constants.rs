//! Constants used throughout the mirrordoc library.

/// Capacity of a dispatcher's recent-results feed.
pub const DEFAULT_RESULT_CAPACITY: usize = 10;

/// Number of operations an in-memory store keeps in its log.
pub const DEFAULT_OP_LOG_CAPACITY: usize = 1024;

/// Priority given to writes when nothing else is configured.
pub const DEFAULT_PRIORITY: u32 = 1;

/// Prefix of the disposable marker written over array elements that are
/// about to be pulled.
pub const SENTINEL_PREFIX: &str = "__mirrordoc_removed_";
