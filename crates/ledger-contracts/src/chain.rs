//! Chain identity and position types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// The `previous_hash` carried by the first entry of every chain.
///
/// 64 hex zeros.  No real SHA-256 digest is expected to collide with it, so a
/// genesis entry is unambiguous.
pub const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Name of one independent hash chain.
///
/// Each chain has its own genesis entry and its own single writer.  The name
/// doubles as a file stem in the JSON-lines store, so it is restricted to
/// ASCII alphanumerics, `-`, `_` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl ChainId {
    /// Validate and wrap a chain name.
    pub fn new(name: impl Into<String>) -> LedgerResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LedgerError::validation("chain_id", "chain name must not be empty"));
        }
        if name.starts_with('.') {
            return Err(LedgerError::validation(
                "chain_id",
                format!("chain name '{name}' must not start with '.'"),
            ));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(LedgerError::validation(
                "chain_id",
                format!("chain name '{name}' contains unsupported character {bad:?}"),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChainId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChainId> for String {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// The head of a chain as currently visible in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTail {
    /// Sequence number of the last appended entry.
    pub sequence: u64,
    /// `sequence_hash` of the last appended entry.
    pub sequence_hash: String,
}

/// What the first entry of a verified slice must link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "hash")]
pub enum ChainAnchor {
    /// The slice starts at the beginning of the chain.
    Genesis,
    /// The slice starts mid-chain; this is its predecessor's `sequence_hash`.
    Hash(String),
    /// The predecessor is unknown.  First-entry continuity is not asserted.
    Unanchored,
}

impl ChainAnchor {
    /// The hash the first entry's `previous_hash` must equal, if any.
    pub fn expected_hash(&self) -> Option<&str> {
        match self {
            ChainAnchor::Genesis => Some(GENESIS),
            ChainAnchor::Hash(h) => Some(h),
            ChainAnchor::Unanchored => None,
        }
    }
}

/// Left behind by a retention purge so the surviving suffix stays anchored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeCheckpoint {
    pub chain_id: ChainId,
    /// Sequence of the newest entry removed.
    pub last_purged_sequence: u64,
    /// `sequence_hash` of the newest entry removed.
    pub last_purged_hash: String,
    pub purged_at: DateTime<Utc>,
}

/// Result of a retention purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeOutcome {
    pub removed: usize,
    /// `None` when nothing was old enough to remove.
    pub checkpoint: Option<PurgeCheckpoint>,
}
