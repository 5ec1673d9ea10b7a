//! # ledger-contracts
//!
//! Shared types for the tamper-evident audit ledger.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions and error types.

pub mod chain;
pub mod entry;
pub mod error;
pub mod report;

pub use chain::{ChainAnchor, ChainId, ChainTail, PurgeCheckpoint, PurgeOutcome, GENESIS};
pub use entry::{EntryDraft, LedgerEntry};
pub use error::{LedgerError, LedgerResult};
