//! Hash-chain primitives: canonical payloads, sequence hashing, and linking
//! a draft onto a chain tail.
//!
//! Every field that contributes to an entry's hash is listed explicitly so
//! nothing is accidentally omitted.  Fields are length-prefixed so that no two
//! distinct entries can produce the same byte stream.
//!
//! Sequence-hash input layout (in order):
//!   1. chain_id
//!   2. sequence as 8-byte little-endian
//!   3. id (hyphenated UUID)
//!   4. action
//!   5. performed_by
//!   6. details  (presence byte, then value)
//!   7. origin   (presence byte, then value)
//!   8. previous_hash
//!   9. occurred_at as RFC 3339 with nanoseconds and `Z`
//!
//! Text fields are encoded as an 8-byte little-endian length followed by the
//! UTF-8 bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use ledger_contracts::{ChainId, ChainTail, EntryDraft, LedgerEntry, LedgerError, LedgerResult, GENESIS};

// ── Canonical encoding ────────────────────────────────────────────────────────

/// Byte buffer for length-prefixed canonical payloads.
#[derive(Debug, Default)]
pub(crate) struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub(crate) fn text(&mut self, value: &str) -> &mut Self {
        self.0.extend_from_slice(&(value.len() as u64).to_le_bytes());
        self.0.extend_from_slice(value.as_bytes());
        self
    }

    pub(crate) fn optional(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => {
                self.0.push(1);
                self.text(v)
            }
            None => {
                self.0.push(0);
                self
            }
        }
    }

    pub(crate) fn number(&mut self, value: u64) -> &mut Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// Render a timestamp the way it is committed to in hashes and signatures.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Compute the SHA-256 sequence hash for an entry from its stored fields.
///
/// `sequence_hash`, `signature` and `signature_version` are not inputs, so
/// this can be called on a fully-populated entry to check it.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(entry: &LedgerEntry) -> String {
    let mut payload = CanonicalBytes::default();
    payload
        .text(entry.chain_id.as_str())
        .number(entry.sequence)
        .text(&entry.id.hyphenated().to_string())
        .text(&entry.action)
        .text(&entry.performed_by)
        .optional(entry.details.as_deref())
        .optional(entry.origin.as_deref())
        .text(&entry.previous_hash)
        .text(&canonical_timestamp(&entry.occurred_at));

    hex::encode(Sha256::digest(payload.into_inner()))
}

// ── Linker ────────────────────────────────────────────────────────────────────

/// Turns drafts into chained entries.
///
/// The linker is pure: it reads nothing and writes nothing.  The caller
/// supplies the tail it observed and is responsible for persisting the result
/// with a conditional append, under its chain's writer lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChainLinker;

impl ChainLinker {
    pub fn new() -> Self {
        Self
    }

    /// Reject drafts missing a required field.
    pub fn validate(draft: &EntryDraft) -> LedgerResult<()> {
        if draft.action.trim().is_empty() {
            return Err(LedgerError::validation("action", "must not be empty"));
        }
        if draft.performed_by.trim().is_empty() {
            return Err(LedgerError::validation("performed_by", "must not be empty"));
        }
        Ok(())
    }

    /// Link `draft` onto `tail`, producing the next entry of `chain`.
    ///
    /// With no tail the entry becomes the genesis entry: sequence 0,
    /// `previous_hash == GENESIS`.
    pub fn link(
        &self,
        chain: &ChainId,
        draft: EntryDraft,
        tail: Option<&ChainTail>,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<LedgerEntry> {
        Self::validate(&draft)?;

        let (sequence, previous_hash) = match tail {
            Some(t) => {
                let next = t.sequence.checked_add(1).ok_or_else(|| {
                    LedgerError::storage(format!("chain '{chain}' sequence space exhausted"))
                })?;
                (next, t.sequence_hash.clone())
            }
            None => (0, GENESIS.to_string()),
        };

        let mut entry = LedgerEntry {
            id: Uuid::new_v4(),
            chain_id: chain.clone(),
            sequence,
            action: draft.action,
            performed_by: draft.performed_by,
            details: draft.details,
            origin: draft.origin,
            occurred_at,
            previous_hash,
            sequence_hash: String::new(),
            signature: None,
            signature_version: None,
        };
        entry.sequence_hash = hash_entry(&entry);

        debug!(
            chain_id = %chain,
            sequence,
            sequence_hash = %entry.sequence_hash,
            "linked ledger entry"
        );

        Ok(entry)
    }
}
