//! Helpers shared by every store: the conditional-append check and retention
//! prefix selection.

use chrono::{DateTime, Utc};

use ledger_contracts::{ChainTail, LedgerEntry, LedgerError, LedgerResult, PurgeCheckpoint, GENESIS};
use ledger_core::hash_entry;

/// The current head of a chain from its surviving entries, falling back to
/// the purge checkpoint when every entry has been purged.
pub(crate) fn tail_of(
    entries: &[LedgerEntry],
    checkpoint: Option<&PurgeCheckpoint>,
) -> Option<ChainTail> {
    entries
        .last()
        .map(|e| ChainTail {
            sequence: e.sequence,
            sequence_hash: e.sequence_hash.clone(),
        })
        .or_else(|| {
            checkpoint.map(|c| ChainTail {
                sequence: c.last_purged_sequence,
                sequence_hash: c.last_purged_hash.clone(),
            })
        })
}

/// Accept `entry` only if it is exactly the next link after `tail`.
///
/// Rejects entries whose stored hash does not match their fields, so a store
/// never persists something that would fail its own content check.
pub(crate) fn check_next(tail: Option<&ChainTail>, entry: &LedgerEntry) -> LedgerResult<()> {
    let (next_sequence, expected_previous) = match tail {
        Some(t) => (t.sequence + 1, t.sequence_hash.as_str()),
        None => (0, GENESIS),
    };

    if entry.sequence != next_sequence || entry.previous_hash != expected_previous {
        return Err(LedgerError::ChainConflict {
            chain_id: entry.chain_id.to_string(),
            expected_sequence: next_sequence,
            found_sequence: entry.sequence,
        });
    }

    if hash_entry(entry) != entry.sequence_hash {
        return Err(LedgerError::validation(
            "sequence_hash",
            "does not match the entry's canonical payload",
        ));
    }

    Ok(())
}

/// Length of the contiguous prefix of `entries` that occurred before `cutoff`.
///
/// Stops at the first entry at or after the cutoff so the surviving entries
/// always form an unbroken suffix of the chain.
pub(crate) fn prefix_before(entries: &[LedgerEntry], cutoff: DateTime<Utc>) -> usize {
    entries
        .iter()
        .take_while(|e| e.occurred_at < cutoff)
        .count()
}
