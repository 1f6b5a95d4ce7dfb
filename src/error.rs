//! Error Module - gorilla-malloc Error Types
//!
//! Defines all error types surfaced by the allocator engine.

use thiserror::Error;

/// Main error type for all allocator operations.
#[derive(Debug, Error)]
pub enum MallocError {
    /// The OS refused to satisfy a mapping request (out of address space,
    /// RLIMIT exceeded, etc). `available` is `0` when the allocator has no
    /// better figure to report, matching the convention used wherever an
    /// exact available-bytes count isn't tracked.
    #[error("out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// A memory-mapping request was rejected before it ever reached the OS
    /// (e.g. a zero-byte map), or the mapping layer's own state is otherwise
    /// invalid. Distinct from `OutOfMemory`, which is the OS itself running
    /// out of capacity.
    #[error("virtual memory error: {0}")]
    VirtualMemoryError(String),

    #[error("invalid pointer address: {address:#x}")]
    InvalidPointer { address: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MallocError {
    /// Check if this error is recoverable by the caller (retry with a smaller
    /// request, free some memory, etc.) as opposed to indicating a bug.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MallocError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug in the caller or this crate.
    pub fn is_bug(&self) -> bool {
        matches!(self, MallocError::Internal(_) | MallocError::InvalidPointer { .. })
    }
}

/// Result type alias for allocator operations.
pub type Result<T> = std::result::Result<T, MallocError>;

/// Ensure a condition holds, otherwise return an error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
