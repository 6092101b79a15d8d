//! Error types for auction coordination operations.
//!
//! Provides typed error variants so that callers (auctioneer and bidder
//! front ends) can distinguish between store failures, optimistic-write
//! races, missing nodes, and codec issues without leaking store internals.

use thiserror::Error;

/// Top-level error type for the auction-coordination crate.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Store connection or transport-level failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Operation timed out waiting for a response or a watch event.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Version conflict detected during an optimistic write.
    /// Contains the expected version that was stale.
    #[error("version conflict: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// Promotion retry budget exhausted under contention.
    #[error("promotion aborted after {attempts} attempts")]
    PromotionAborted { attempts: u32 },

    /// A stored record failed to decode or failed validation.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// The referenced node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create raced an existing node at the same path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Configuration error (e.g. invalid root path).
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoordinationError {
    /// Returns true if this error indicates a transient failure that may
    /// succeed on retry (store loss, timeout, or version conflict).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinationError::StoreUnavailable(_)
                | CoordinationError::Timeout(_)
                | CoordinationError::VersionConflict { .. }
        )
    }

    /// Returns true if this error is a version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoordinationError::VersionConflict { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoordinationError::Timeout(_))
    }

    /// Returns true if this error reports a missing node.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoordinationError::NotFound(_))
    }
}

/// Shorthand result alias for coordination operations.
pub type CoordinationResult<T> = Result<T, CoordinationError>;
