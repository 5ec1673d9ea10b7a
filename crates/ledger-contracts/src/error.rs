//! Error types for the audit ledger.
//!
//! Every fallible ledger operation returns `LedgerResult<T>`.  Append-path
//! variants mean the event was NOT durably recorded; verification findings are
//! reported as data and only become `ChainIntegrityFailure` when a caller asks
//! for that explicitly.

use thiserror::Error;

/// The unified error type for the audit ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input to `append` (a required field is missing or blank).
    #[error("validation error on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// The durability layer is unavailable or a write could not be confirmed.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// Something attempted to mutate or remove a persisted entry.
    ///
    /// Always fatal to the attempted operation.  The attempt itself is
    /// audit-worthy and is recorded by the ledger facade.
    #[error("immutability violation: {operation} rejected for chain '{chain_id}' sequence {sequence}")]
    ImmutabilityViolation {
        operation: String,
        chain_id: String,
        sequence: u64,
    },

    /// A conditional append lost the race for the chain tail.
    /// `expected_sequence` is what the store would accept next,
    /// `found_sequence` is what the rejected entry carried.
    #[error("chain conflict on '{chain_id}': store expects sequence {expected_sequence}, entry has {found_sequence}")]
    ChainConflict {
        chain_id: String,
        expected_sequence: u64,
        found_sequence: u64,
    },

    /// Verification found the chain altered.  Never raised by `append`.
    #[error("chain integrity failure on '{chain_id}' at index {broken_at}: {reason}")]
    ChainIntegrityFailure {
        chain_id: String,
        broken_at: usize,
        reason: String,
    },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The HMAC key is unusable.
    #[error("signature error: {reason}")]
    Signature { reason: String },

    /// A verification scan was abandoned through its cancellation flag.
    #[error("verification cancelled after {processed} entries")]
    Cancelled { processed: usize },
}

impl LedgerError {
    /// Shorthand for a `Validation` error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `Storage` error.
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage {
            reason: format!("I/O failure: {e}"),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage {
            reason: format!("malformed ledger record: {e}"),
        }
    }
}

/// Convenience alias used throughout the ledger crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
