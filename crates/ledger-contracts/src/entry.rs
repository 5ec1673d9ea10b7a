//! Ledger entry types.
//!
//! `EntryDraft` is what a producer hands to the ledger: the business fields of
//! one event.  `LedgerEntry` is the immutable record the ledger persists once
//! the draft has been linked into a chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::{ChainId, GENESIS};

/// The business fields of an event, before it is linked into a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    /// Short category string, e.g. "User Registered".  Required.
    pub action: String,
    /// Identity of the actor (email or system label).  Required.
    pub performed_by: String,
    pub details: Option<String>,
    /// Caller IP or equivalent.
    pub origin: Option<String>,
}

impl EntryDraft {
    pub fn new(action: impl Into<String>, performed_by: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            performed_by: performed_by.into(),
            details: None,
            origin: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// One immutable event record in a hash chain.
///
/// `sequence_hash` commits to every business field, the entry's position, and
/// `previous_hash`.  Changing any of them after the fact makes the stored hash
/// disagree with the recomputed one, and changing the hash itself breaks the
/// next entry's `previous_hash` link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub chain_id: ChainId,
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub action: String,
    pub performed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// `sequence_hash` of the predecessor, or [`GENESIS`] for sequence 0.
    pub previous_hash: String,
    /// SHA-256 (hex) of this entry's canonical payload.
    pub sequence_hash: String,
    /// HMAC-SHA256 (hex) over the business fields, when signature mode is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_version: Option<u32>,
}

impl LedgerEntry {
    /// True for the first entry of a chain.
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS
    }

    /// The business fields of this entry as a draft.
    pub fn draft(&self) -> EntryDraft {
        EntryDraft {
            action: self.action.clone(),
            performed_by: self.performed_by.clone(),
            details: self.details.clone(),
            origin: self.origin.clone(),
        }
    }
}
