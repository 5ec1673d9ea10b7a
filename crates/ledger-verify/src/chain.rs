//! End-to-end hash-chain verification.
//!
//! Two independent checks run for every entry:
//!
//! 1. **Content**: the entry's stored fields still hash to its stored
//!    `sequence_hash`.  A failure means the entry was edited.
//! 2. **Continuity**: the entry's `previous_hash` equals the predecessor's
//!    stored `sequence_hash` (or the anchor, for the first entry).  A failure
//!    means an entry was deleted, inserted, reordered, or the chain forked.
//!
//! Scanning never stops at the first broken entry: one break must not hide a
//! later, unrelated one.

use tracing::{debug, info};

use ledger_contracts::{
    report::{ChainVerification, EntryCheck},
    ChainAnchor, LedgerEntry, LedgerError, LedgerResult,
};
use ledger_core::hash_entry;

use crate::cancel::CancellationFlag;

/// Walks a sequence of entries and validates the hash chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChainVerifier;

impl ChainVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify a sequence that starts at the beginning of its chain.
    ///
    /// Entry 0 must carry `previous_hash == GENESIS`.  An empty sequence is
    /// valid.
    pub fn verify_chain(&self, entries: &[LedgerEntry]) -> ChainVerification {
        self.verify_anchored(entries, &ChainAnchor::Genesis)
    }

    /// Verify a sequence whose first entry must link to `anchor`.
    pub fn verify_anchored(&self, entries: &[LedgerEntry], anchor: &ChainAnchor) -> ChainVerification {
        let checks = (0..entries.len())
            .map(|index| check_entry(entries, index, anchor))
            .collect();
        summarize(checks)
    }

    /// Like [`verify_anchored`](Self::verify_anchored), but abandons the scan
    /// with `LedgerError::Cancelled` once `cancel` is set.
    pub fn verify_cancellable(
        &self,
        entries: &[LedgerEntry],
        anchor: &ChainAnchor,
        cancel: &CancellationFlag,
    ) -> LedgerResult<ChainVerification> {
        let mut checks = Vec::with_capacity(entries.len());
        for index in 0..entries.len() {
            if cancel.is_cancelled() {
                info!(processed = index, "chain verification cancelled");
                return Err(LedgerError::Cancelled { processed: index });
            }
            checks.push(check_entry(entries, index, anchor));
        }
        Ok(summarize(checks))
    }
}

fn summarize(checks: Vec<EntryCheck>) -> ChainVerification {
    let broken_at = checks.iter().find(|c| c.tampered).map(|c| c.index);
    let verification = ChainVerification {
        all_valid: broken_at.is_none(),
        broken_at,
        entries: checks,
    };

    info!(
        entries = verification.entries.len(),
        all_valid = verification.all_valid,
        broken_at = ?verification.broken_at,
        "chain verification complete"
    );

    verification
}

/// Run both checks on `entries[index]`.
fn check_entry(entries: &[LedgerEntry], index: usize, anchor: &ChainAnchor) -> EntryCheck {
    let entry = &entries[index];

    let recomputed = hash_entry(entry);
    let content_valid = recomputed == entry.sequence_hash;

    let expected_previous = if index == 0 {
        anchor.expected_hash()
    } else {
        Some(entries[index - 1].sequence_hash.as_str())
    };
    let continuity_valid = expected_previous.map_or(true, |h| entry.previous_hash == h);

    let reason = if !content_valid {
        Some(format!(
            "content hash mismatch: stored {}, recomputed {}",
            entry.sequence_hash, recomputed
        ))
    } else if !continuity_valid {
        Some(if index == 0 {
            format!(
                "first entry does not link to its anchor: previous_hash {}",
                entry.previous_hash
            )
        } else {
            format!(
                "previous_hash {} does not match predecessor sequence_hash {}",
                entry.previous_hash,
                entries[index - 1].sequence_hash
            )
        })
    } else {
        None
    };

    if let Some(reason) = &reason {
        debug!(index, sequence = entry.sequence, %reason, "entry failed verification");
    }

    EntryCheck {
        index,
        sequence: entry.sequence,
        content_valid,
        continuity_valid,
        tampered: !(content_valid && continuity_valid),
        reason,
    }
}
