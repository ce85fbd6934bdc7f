//! Error types for the sizediff reconciliation engine.
//!
//! This module provides structured error handling using thiserror. Every
//! fallible operation in the crate returns [`Result`], and errors are never
//! swallowed inside the core: presenting them is the caller's job.

use thiserror::Error;

use crate::core::address_range::AddressRange;

/// Main error type for diff operations.
#[derive(Debug, Error)]
pub enum DiffError {
    /// A diff was requested with neither a before nor an after side.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// `AddressRangeSet::add` / `union_with` given a conflicting range
    #[error("Range set conflict: {incoming} overlaps or is adjacent to existing range {existing}")]
    RangeSetConflict {
        incoming: AddressRange,
        existing: AddressRange,
    },

    /// Attempt to merge a virtual-only range with an on-disk range
    #[error("Invalid merge: cannot combine {first} with {second}, virtual and physical ranges never merge")]
    InvalidMerge {
        first: AddressRange,
        second: AddressRange,
    },

    /// Defect in the matching algorithm, not in the input data.
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// Cooperative cancellation. Not a failure.
    #[error("Operation cancelled")]
    Cancelled,

    /// Failure reported by a before/after debug-info source
    #[error("Debug info source error: {0}")]
    Source(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiffError {
    /// True for [`DiffError::Cancelled`].
    ///
    /// Callers use this to keep cancellation out of their error reporting.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DiffError::Cancelled)
    }

    pub(crate) fn both_sides_absent(what: &str) -> Self {
        DiffError::InvariantViolation(format!(
            "both before and after {} are absent, a diff needs at least one side",
            what
        ))
    }
}

/// Result type alias for diff operations
pub type Result<T> = std::result::Result<T, DiffError>;
