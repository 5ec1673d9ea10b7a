//! JSON-lines implementation of `LedgerStore`.
//!
//! Each chain lives in `<dir>/<chain>.jsonl`, one serialized `LedgerEntry`
//! per line, in append order.  Appends are written with a single `write_all`
//! and followed by `sync_data` before `append` returns, so a successful append
//! survives a crash.  A failed write or sync is truncated away before the
//! error is returned.  A purge leaves `<dir>/<chain>.checkpoint.json` behind.
//!
//! One process owns a data directory at a time.  Within that process, appends
//! are serialized by the tail cache's write lock and readers share its read
//! lock.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use ledger_contracts::{
    ChainId, ChainTail, LedgerEntry, LedgerError, LedgerResult, PurgeCheckpoint, PurgeOutcome,
};
use ledger_core::traits::LedgerStore;

use crate::append::{check_next, prefix_before, tail_of};

const ENTRY_EXTENSION: &str = "jsonl";
const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// A durable, append-only ledger store backed by JSON-lines files.
#[derive(Debug)]
pub struct FileLedgerStore {
    dir: PathBuf,
    /// Known chains and their current tails.  `None` means the chain file
    /// exists but holds no entries and no checkpoint.
    tails: RwLock<BTreeMap<ChainId, Option<ChainTail>>>,
    /// Chains whose last failed append could not be rolled back.  Appends to
    /// them are refused until the store is reopened.
    damaged: Mutex<BTreeSet<ChainId>>,
}

impl FileLedgerStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// Every existing chain file is scanned once to restore its tail.  A line
    /// that does not parse is reported as `LedgerError::Storage` rather than
    /// skipped.
    pub fn open(dir: impl AsRef<Path>) -> LedgerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut tails = BTreeMap::new();
        for item in fs::read_dir(&dir)? {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let chain = match ChainId::new(stem) {
                Ok(c) => c,
                Err(_) => {
                    warn!(path = %path.display(), "ignoring file with invalid chain name");
                    continue;
                }
            };

            let entries = read_entries(&path)?;
            let checkpoint = read_checkpoint(&checkpoint_path(&dir, &chain))?;
            tails.insert(chain, tail_of(&entries, checkpoint.as_ref()));
        }

        info!(dir = %dir.display(), chains = tails.len(), "opened file ledger store");

        Ok(Self {
            dir,
            tails: RwLock::new(tails),
            damaged: Mutex::new(BTreeSet::new()),
        })
    }

    /// The directory this store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the JSON-lines file holding `chain`.
    pub fn chain_path(&self, chain: &ChainId) -> PathBuf {
        entries_path(&self.dir, chain)
    }

    fn read_lock(&self) -> LedgerResult<RwLockReadGuard<'_, BTreeMap<ChainId, Option<ChainTail>>>> {
        self.tails
            .read()
            .map_err(|e| LedgerError::storage(format!("tail cache lock poisoned: {e}")))
    }

    fn write_lock(
        &self,
    ) -> LedgerResult<RwLockWriteGuard<'_, BTreeMap<ChainId, Option<ChainTail>>>> {
        self.tails
            .write()
            .map_err(|e| LedgerError::storage(format!("tail cache lock poisoned: {e}")))
    }

    fn damaged_lock(&self) -> LedgerResult<MutexGuard<'_, BTreeSet<ChainId>>> {
        self.damaged
            .lock()
            .map_err(|e| LedgerError::storage(format!("damaged-chain set lock poisoned: {e}")))
    }

    fn entries_for(&self, chain: &ChainId) -> LedgerResult<Vec<LedgerEntry>> {
        let path = entries_path(&self.dir, chain);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_entries(&path)
    }
}

impl LedgerStore for FileLedgerStore {
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        let mut tails = self.write_lock()?;
        if self.damaged_lock()?.contains(&entry.chain_id) {
            return Err(LedgerError::storage(format!(
                "chain '{}' may end in a partial entry; repair the file and reopen the store",
                entry.chain_id
            )));
        }
        let tail = tails.get(&entry.chain_id).cloned().flatten();
        check_next(tail.as_ref(), entry)?;

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let path = entries_path(&self.dir, &entry.chain_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        match append_line(&mut file, &line) {
            Ok(()) => {}
            Err(AppendFault::RolledBack(e)) => {
                warn!(
                    chain_id = %entry.chain_id,
                    sequence = entry.sequence,
                    error = %e,
                    "append failed and was rolled back"
                );
                return Err(e.into());
            }
            Err(AppendFault::Torn { write, rollback }) => {
                error!(
                    chain_id = %entry.chain_id,
                    sequence = entry.sequence,
                    write_error = %write,
                    rollback_error = %rollback,
                    "append failed and could not be rolled back; chain closed until reopen"
                );
                self.damaged_lock()?.insert(entry.chain_id.clone());
                return Err(LedgerError::storage(format!(
                    "append to '{}' failed ({write}) and could not be rolled back ({rollback})",
                    entry.chain_id
                )));
            }
        }

        tails.insert(
            entry.chain_id.clone(),
            Some(ChainTail {
                sequence: entry.sequence,
                sequence_hash: entry.sequence_hash.clone(),
            }),
        );

        debug!(
            chain_id = %entry.chain_id,
            sequence = entry.sequence,
            path = %path.display(),
            "entry appended to file store"
        );
        Ok(())
    }

    fn tail(&self, chain: &ChainId) -> LedgerResult<Option<ChainTail>> {
        Ok(self.read_lock()?.get(chain).cloned().flatten())
    }

    fn read_range(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>> {
        let _guard = self.read_lock()?;
        let mut entries = self.entries_for(chain)?;
        entries.retain(|e| e.sequence >= from && e.sequence < to);
        Ok(entries)
    }

    fn read_since(&self, chain: &ChainId, since: DateTime<Utc>) -> LedgerResult<Vec<LedgerEntry>> {
        let _guard = self.read_lock()?;
        let mut entries = self.entries_for(chain)?;
        entries.retain(|e| e.occurred_at >= since);
        Ok(entries)
    }

    fn chains(&self) -> LedgerResult<Vec<ChainId>> {
        Ok(self.read_lock()?.keys().cloned().collect())
    }

    fn checkpoint(&self, chain: &ChainId) -> LedgerResult<Option<PurgeCheckpoint>> {
        let _guard = self.read_lock()?;
        read_checkpoint(&checkpoint_path(&self.dir, chain))
    }

    fn purge_before(&self, chain: &ChainId, cutoff: DateTime<Utc>) -> LedgerResult<PurgeOutcome> {
        let mut tails = self.write_lock()?;
        let entries = self.entries_for(chain)?;

        let removed = prefix_before(&entries, cutoff);
        if removed == 0 {
            return Ok(PurgeOutcome {
                removed: 0,
                checkpoint: None,
            });
        }

        let newest = &entries[removed - 1];
        let checkpoint = PurgeCheckpoint {
            chain_id: chain.clone(),
            last_purged_sequence: newest.sequence,
            last_purged_hash: newest.sequence_hash.clone(),
            purged_at: Utc::now(),
        };

        // Checkpoint first so the tail survives a crash after the rewrite.  If
        // the rewrite fails instead, every entry is still on disk and readers
        // must ignore a checkpoint that covers stored entries.
        write_atomically(
            &checkpoint_path(&self.dir, chain),
            &serde_json::to_vec_pretty(&checkpoint)?,
        )?;

        let mut survivors = Vec::new();
        for entry in &entries[removed..] {
            survivors.extend(serde_json::to_vec(entry)?);
            survivors.push(b'\n');
        }
        write_atomically(&entries_path(&self.dir, chain), &survivors)?;

        tails.insert(
            chain.clone(),
            tail_of(&entries[removed..], Some(&checkpoint)),
        );

        info!(
            chain_id = %chain,
            removed,
            last_purged_sequence = checkpoint.last_purged_sequence,
            "purged expired entries from file store"
        );

        Ok(PurgeOutcome {
            removed,
            checkpoint: Some(checkpoint),
        })
    }
}

// ── File helpers ──────────────────────────────────────────────────────────────

fn entries_path(dir: &Path, chain: &ChainId) -> PathBuf {
    dir.join(format!("{chain}.{ENTRY_EXTENSION}"))
}

fn checkpoint_path(dir: &Path, chain: &ChainId) -> PathBuf {
    dir.join(format!("{chain}{CHECKPOINT_SUFFIX}"))
}

/// The file operations one append needs.
pub(crate) trait AppendTarget: Write {
    fn committed_len(&mut self) -> io::Result<u64>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn committed_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Why [`append_line`] failed.
#[derive(Debug)]
pub(crate) enum AppendFault {
    /// The file is back at its length before the append.
    RolledBack(io::Error),
    /// The file may end in part of the line.
    Torn { write: io::Error, rollback: io::Error },
}

/// Write and sync one line.  On failure, cut the file back to where it
/// was so a retried append cannot leave two entries with one sequence.
pub(crate) fn append_line<T: AppendTarget>(target: &mut T, line: &[u8]) -> Result<(), AppendFault> {
    let committed = target.committed_len().map_err(AppendFault::RolledBack)?;
    let write = match target.write_all(line).and_then(|()| target.sync()) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    match target.truncate(committed).and_then(|()| target.sync()) {
        Ok(()) => Err(AppendFault::RolledBack(write)),
        Err(rollback) => Err(AppendFault::Torn { write, rollback }),
    }
}

fn read_entries(path: &Path) -> LedgerResult<Vec<LedgerEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LedgerEntry = serde_json::from_str(&line).map_err(|e| {
            LedgerError::storage(format!(
                "malformed entry at {}:{}: {e}",
                path.display(),
                idx + 1
            ))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

fn read_checkpoint(path: &Path) -> LedgerResult<Option<PurgeCheckpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write `bytes` to a sibling temp file, sync it, then rename over `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> LedgerResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
