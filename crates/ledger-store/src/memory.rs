//! In-memory implementation of `LedgerStore`.
//!
//! `InMemoryLedgerStore` keeps every chain in a `Vec` behind an `RwLock`.
//! It is the reference store for tests and demos: durable for the life of the
//! process and nothing longer.

use std::{
    collections::BTreeMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use ledger_contracts::{
    ChainId, ChainTail, LedgerEntry, LedgerError, LedgerResult, PurgeCheckpoint, PurgeOutcome,
};
use ledger_core::traits::LedgerStore;

use crate::append::{check_next, prefix_before, tail_of};

// ── Internal state ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct ChainState {
    /// Surviving entries in append order.
    pub(crate) entries: Vec<LedgerEntry>,
    pub(crate) checkpoint: Option<PurgeCheckpoint>,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An append-only ledger store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    pub(crate) chains: RwLock<BTreeMap<ChainId, ChainState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, BTreeMap<ChainId, ChainState>>> {
        self.chains
            .read()
            .map_err(|e| LedgerError::storage(format!("ledger state lock poisoned: {e}")))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, BTreeMap<ChainId, ChainState>>> {
        self.chains
            .write()
            .map_err(|e| LedgerError::storage(format!("ledger state lock poisoned: {e}")))
    }

    /// Total number of surviving entries across all chains.
    pub fn len(&self) -> usize {
        self.read()
            .map(|chains| chains.values().map(|c| c.entries.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        let mut chains = self.write()?;

        let tail = chains
            .get(&entry.chain_id)
            .and_then(|s| tail_of(&s.entries, s.checkpoint.as_ref()));
        check_next(tail.as_ref(), entry)?;

        chains
            .entry(entry.chain_id.clone())
            .or_default()
            .entries
            .push(entry.clone());

        debug!(
            chain_id = %entry.chain_id,
            sequence = entry.sequence,
            "entry appended to in-memory store"
        );
        Ok(())
    }

    fn tail(&self, chain: &ChainId) -> LedgerResult<Option<ChainTail>> {
        let chains = self.read()?;
        Ok(chains
            .get(chain)
            .and_then(|s| tail_of(&s.entries, s.checkpoint.as_ref())))
    }

    fn read_range(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>> {
        let chains = self.read()?;
        Ok(chains
            .get(chain)
            .map(|s| {
                s.entries
                    .iter()
                    .filter(|e| e.sequence >= from && e.sequence < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn read_since(&self, chain: &ChainId, since: DateTime<Utc>) -> LedgerResult<Vec<LedgerEntry>> {
        let chains = self.read()?;
        Ok(chains
            .get(chain)
            .map(|s| {
                s.entries
                    .iter()
                    .filter(|e| e.occurred_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn chains(&self) -> LedgerResult<Vec<ChainId>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn checkpoint(&self, chain: &ChainId) -> LedgerResult<Option<PurgeCheckpoint>> {
        Ok(self.read()?.get(chain).and_then(|s| s.checkpoint.clone()))
    }

    fn purge_before(&self, chain: &ChainId, cutoff: DateTime<Utc>) -> LedgerResult<PurgeOutcome> {
        let mut chains = self.write()?;
        let Some(state) = chains.get_mut(chain) else {
            return Ok(PurgeOutcome {
                removed: 0,
                checkpoint: None,
            });
        };

        let removed = prefix_before(&state.entries, cutoff);
        if removed == 0 {
            return Ok(PurgeOutcome {
                removed: 0,
                checkpoint: None,
            });
        }

        let newest = &state.entries[removed - 1];
        let checkpoint = PurgeCheckpoint {
            chain_id: chain.clone(),
            last_purged_sequence: newest.sequence,
            last_purged_hash: newest.sequence_hash.clone(),
            purged_at: Utc::now(),
        };
        state.entries.drain(..removed);
        state.checkpoint = Some(checkpoint.clone());

        info!(
            chain_id = %chain,
            removed,
            last_purged_sequence = checkpoint.last_purged_sequence,
            "purged expired entries from in-memory store"
        );

        Ok(PurgeOutcome {
            removed,
            checkpoint: Some(checkpoint),
        })
    }
}
