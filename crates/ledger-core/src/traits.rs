//! Seams between the ledger and its collaborators.
//!
//! - `LedgerStore`: durable, ordered, append-only storage
//! - `Clock`      : the source of `occurred_at` timestamps
//! - `AlertSink`  : out-of-band notification when verification finds tampering
//!
//! The ledger facade wires them together; none of them know about each other.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use ledger_contracts::{
    report::IntegrityReport, ChainId, ChainTail, LedgerEntry, LedgerError, LedgerResult,
    PurgeCheckpoint, PurgeOutcome,
};

/// Append-only storage for ledger entries.
///
/// Implementations must be thread-safe.  Reads may run in parallel with each
/// other and with appends; a reader sees the chain as of its read.
pub trait LedgerStore: Send + Sync {
    /// Persist `entry` as the new tail of its chain.
    ///
    /// This is a conditional write: it succeeds only if `entry.sequence` is
    /// the chain's next sequence and `entry.previous_hash` equals the current
    /// tail hash (or GENESIS for an empty chain).  Otherwise it fails with
    /// `LedgerError::ChainConflict` and nothing is written.
    ///
    /// Returning `Ok` means the entry is durable and visible to every
    /// subsequent read.
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()>;

    /// The current head of `chain`, or `None` if it has no entries.
    ///
    /// A purged chain with no surviving entries reports its checkpoint as the
    /// tail so new appends continue the sequence.
    fn tail(&self, chain: &ChainId) -> LedgerResult<Option<ChainTail>>;

    /// Entries with `from <= sequence < to`, in insertion order.
    fn read_range(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>>;

    /// Entries with `occurred_at >= since`, in insertion order.
    fn read_since(&self, chain: &ChainId, since: DateTime<Utc>) -> LedgerResult<Vec<LedgerEntry>>;

    /// Every chain that has ever been appended to.
    fn chains(&self) -> LedgerResult<Vec<ChainId>>;

    /// The anchor left by the most recent purge of `chain`, if any.
    fn checkpoint(&self, chain: &ChainId) -> LedgerResult<Option<PurgeCheckpoint>>;

    /// Remove the contiguous prefix of `chain` older than `cutoff`.
    ///
    /// Retention only.  This sits outside the tamper-evidence guarantee and
    /// must only be reached through an explicitly authorized purge.
    fn purge_before(&self, chain: &ChainId, cutoff: DateTime<Utc>) -> LedgerResult<PurgeOutcome>;

    /// Replace a persisted entry.  Always rejected.
    fn replace(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        Err(LedgerError::ImmutabilityViolation {
            operation: "replace".to_string(),
            chain_id: entry.chain_id.to_string(),
            sequence: entry.sequence,
        })
    }

    /// Delete a persisted entry.  Always rejected.
    fn delete(&self, chain: &ChainId, sequence: u64) -> LedgerResult<()> {
        Err(LedgerError::ImmutabilityViolation {
            operation: "delete".to_string(),
            chain_id: chain.to_string(),
            sequence,
        })
    }
}

/// Source of entry timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.  Used by tests and scenarios that
/// need to age entries past a retention window.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Receives integrity reports that found tampering.
///
/// Alerting must not fail the verification that triggered it, so this
/// returns nothing.
pub trait AlertSink: Send + Sync {
    fn alert(&self, report: &IntegrityReport);
}
