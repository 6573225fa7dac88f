//! Error types for the NOL manager
//!
//! None of these escape the public manager operations as hard failures.
//! They are logged where they occur and the manager keeps running.

use std::collections::TryReserveError;

use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// Errors and defect diagnostics raised inside the NOL core
#[derive(Debug, Error)]
pub enum NolError {
    /// Memory for a new entry could not be reserved
    #[error("failed to allocate memory for NOL entry: {0}")]
    AllocationFailure(#[from] TryReserveError),

    /// The store is at its configured capacity
    #[error("NOL is full: {max} entries")]
    CapacityExhausted {
        /// Configured maximum number of entries
        max: usize,
    },

    /// The entry counter would have gone below zero
    #[error("NOL count would go negative during {operation}; clamped to zero")]
    CountUnderflow {
        /// Store operation that detected the underflow
        operation: &'static str,
    },

    /// The entry counter disagrees with the number of live entries
    #[error("NOL count ({count}) does not match live entries ({live})")]
    CountMismatch {
        /// Value of the counter
        count: usize,
        /// Number of entries actually in the store
        live: usize,
    },

    /// The tokio scheduler was created outside of a runtime
    #[error("no tokio runtime available for the expiry scheduler: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

impl NolError {
    /// Whether this error means the store's bookkeeping was found corrupt
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::CountUnderflow { .. } | Self::CountMismatch { .. }
        )
    }
}
