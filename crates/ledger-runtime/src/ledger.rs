//! The `Ledger` facade: the single entry point producers and auditors use.
//!
//! Every append follows the same pipeline:
//!
//!   chain lock → read tail → link → sign → conditional append
//!
//! The per-chain lock serializes writers inside this process.  The store's
//! compare-and-append rejects anything that still races past it (another
//! process on the same store), and the append is retried against the new
//! tail a bounded number of times.

use std::{
    collections::HashMap,
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::Duration;
use tracing::{debug, error, info, warn};

use ledger_config::LedgerConfig;
use ledger_contracts::{
    report::{ChainVerification, IntegrityReport},
    ChainAnchor, ChainId, EntryDraft, LedgerEntry, LedgerError, LedgerResult, PurgeOutcome,
};
use ledger_core::{AlertSink, ChainLinker, Clock, EntrySigner, LedgerStore, SystemClock};
use ledger_store::FileLedgerStore;
use ledger_verify::{CancellationFlag, ChainVerifier, IntegrityReporter, RiskThresholds, Segment};

use crate::{alert::TracingAlertSink, export::write_csv};

/// Attempts per append before a persistent `ChainConflict` is returned.
pub const MAX_APPEND_ATTEMPTS: usize = 3;

/// `action` recorded when a replace or delete is refused.
pub const IMMUTABILITY_VIOLATION_ACTION: &str = "Immutability Violation";

/// `action` recorded after an authorized retention purge.
pub const RETENTION_PURGE_ACTION: &str = "Retention Purge";

/// Upper bound for "the whole chain" range reads.
const END_OF_CHAIN: u64 = u64::MAX;

/// Policy knobs the facade needs at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSettings {
    pub thresholds: RiskThresholds,
    /// `None` disables `purge_expired`.
    pub retention_days: Option<u32>,
}

impl LedgerSettings {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            thresholds: config.risk,
            retention_days: config.retention_days(),
        }
    }
}

/// Append, verify, report on, purge, and export ledger chains.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    settings: LedgerSettings,
    linker: ChainLinker,
    verifier: ChainVerifier,
    reporter: IntegrityReporter,
    signer: Option<EntrySigner>,
    clock: Arc<dyn Clock>,
    alerts: Arc<dyn AlertSink>,
    writers: Mutex<HashMap<ChainId, Arc<Mutex<()>>>>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            reporter: IntegrityReporter::new(settings.thresholds),
            settings,
            linker: ChainLinker::new(),
            verifier: ChainVerifier::new(),
            signer: None,
            clock: Arc::new(SystemClock),
            alerts: Arc::new(TracingAlertSink),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Build a ledger over the file store in `config.ledger.data_dir`,
    /// with signature mode on when the config asks for it.
    pub fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        Self::open_at(config, &config.ledger.data_dir)
    }

    /// Like [`open`](Self::open) with an explicit data directory.
    pub fn open_at(config: &LedgerConfig, data_dir: &Path) -> LedgerResult<Self> {
        let store = FileLedgerStore::open(data_dir)?;
        let mut ledger = Self::new(Arc::new(store), LedgerSettings::from_config(config));
        if let Some(key) = config.resolve_signature_key()? {
            ledger = ledger.with_signer(EntrySigner::new(&key)?);
        }
        Ok(ledger)
    }

    /// Sign every new entry and check signatures in reports.
    pub fn with_signer(mut self, signer: EntrySigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn signs_entries(&self) -> bool {
        self.signer.is_some()
    }

    pub fn chains(&self) -> LedgerResult<Vec<ChainId>> {
        self.store.chains()
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Append `draft` as the next entry of `chain`.
    ///
    /// Blocks until the entry is durable.  Concurrent calls for the same chain
    /// are serialized; calls for different chains proceed independently.
    ///
    /// # Errors
    ///
    /// `Validation` for a draft missing `action` or `performed_by`,
    /// `ChainConflict` if the tail kept moving for `MAX_APPEND_ATTEMPTS`
    /// tries, and `Storage` for persistence failures.
    pub fn append(&self, chain: &ChainId, draft: EntryDraft) -> LedgerResult<LedgerEntry> {
        ChainLinker::validate(&draft)?;
        let writer = self.writer_for(chain)?;
        let _guard = writer
            .lock()
            .map_err(|e| LedgerError::storage(format!("chain '{chain}' writer lock poisoned: {e}")))?;
        self.append_locked(chain, draft)
    }

    /// The append pipeline.  The caller holds `chain`'s writer lock.
    fn append_locked(&self, chain: &ChainId, draft: EntryDraft) -> LedgerResult<LedgerEntry> {
        let mut attempt = 1;
        loop {
            // ── Step 1: observe the tail ─────────────────────────────────────
            let tail = self.store.tail(chain)?;

            // ── Step 2: link and sign ────────────────────────────────────────
            let mut entry = self
                .linker
                .link(chain, draft.clone(), tail.as_ref(), self.clock.now())?;
            if let Some(signer) = &self.signer {
                signer.seal(&mut entry);
            }

            // ── Step 3: conditional append ───────────────────────────────────
            match self.store.append(&entry) {
                Ok(()) => {
                    debug!(
                        chain_id = %chain,
                        sequence = entry.sequence,
                        action = %entry.action,
                        "ledger entry appended"
                    );
                    return Ok(entry);
                }
                Err(LedgerError::ChainConflict {
                    expected_sequence,
                    found_sequence,
                    ..
                }) if attempt < MAX_APPEND_ATTEMPTS => {
                    warn!(
                        chain_id = %chain,
                        attempt,
                        expected_sequence,
                        found_sequence,
                        "chain tail moved during append, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ask the store to overwrite a persisted entry.
    ///
    /// Stores refuse; the refusal is itself appended to the entry's chain on
    /// behalf of `requested_by` before the error is returned.
    pub fn replace(&self, entry: &LedgerEntry, requested_by: &str) -> LedgerResult<()> {
        let result = self.store.replace(entry);
        self.record_refusal(result, requested_by)
    }

    /// Ask the store to delete a persisted entry.  Refused and recorded like
    /// [`replace`](Self::replace).
    pub fn delete(&self, chain: &ChainId, sequence: u64, requested_by: &str) -> LedgerResult<()> {
        let result = self.store.delete(chain, sequence);
        self.record_refusal(result, requested_by)
    }

    fn record_refusal(&self, result: LedgerResult<()>, requested_by: &str) -> LedgerResult<()> {
        let (operation, chain_id, sequence) = match result {
            Err(LedgerError::ImmutabilityViolation {
                operation,
                chain_id,
                sequence,
            }) => (operation, chain_id, sequence),
            other => return other,
        };

        warn!(
            chain_id = %chain_id,
            sequence,
            operation = %operation,
            requested_by = %requested_by,
            "refused attempt to modify a persisted ledger entry"
        );

        let requester = match requested_by.trim() {
            "" => "unknown",
            name => name,
        };
        let draft = EntryDraft::new(IMMUTABILITY_VIOLATION_ACTION, requester)
            .with_details(format!("refused {operation} of sequence {sequence}"));
        let recorded = ChainId::new(chain_id.clone()).and_then(|chain| self.append(&chain, draft));

        // The refusal stays the caller's error even when it cannot be recorded.
        if let Err(e) = recorded {
            error!(
                chain_id = %chain_id,
                sequence,
                operation = %operation,
                error = %e,
                "failed to record refused modification on the chain"
            );
        }

        Err(LedgerError::ImmutabilityViolation {
            operation,
            chain_id,
            sequence,
        })
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Entries with `from <= sequence < to`.
    pub fn read_range(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>> {
        self.store.read_range(chain, from, to)
    }

    /// Entries of `chain` that occurred at or after `since`.
    pub fn read_since(
        &self,
        chain: &ChainId,
        since: chrono::DateTime<chrono::Utc>,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        self.store.read_since(chain, since)
    }

    /// Read `[from, to)` together with the anchor its first entry must link
    /// to.
    ///
    /// A range reaching into a purged prefix is clipped to the surviving
    /// suffix and anchored on the purge checkpoint.  A checkpoint is only
    /// trusted once none of the entries it covers are still stored.
    pub fn anchored_range(
        &self,
        chain: &ChainId,
        from: u64,
        to: u64,
    ) -> LedgerResult<(Vec<LedgerEntry>, ChainAnchor)> {
        let checkpoint = match self.store.checkpoint(chain)? {
            Some(cp) => {
                let covered = cp.last_purged_sequence.saturating_add(1);
                if self.store.read_range(chain, 0, covered)?.is_empty() {
                    Some(cp)
                } else {
                    // Left by a purge whose rewrite did not complete.
                    warn!(
                        chain_id = %chain,
                        last_purged_sequence = cp.last_purged_sequence,
                        "ignoring purge checkpoint over entries that are still stored"
                    );
                    None
                }
            }
            None => None,
        };

        let anchor = match &checkpoint {
            Some(cp) if from <= cp.last_purged_sequence => {
                ChainAnchor::Hash(cp.last_purged_hash.clone())
            }
            _ if from == 0 => ChainAnchor::Genesis,
            Some(cp) if from - 1 == cp.last_purged_sequence => {
                ChainAnchor::Hash(cp.last_purged_hash.clone())
            }
            _ => match self.store.read_range(chain, from - 1, from)?.pop() {
                Some(prev) => ChainAnchor::Hash(prev.sequence_hash),
                None => ChainAnchor::Unanchored,
            },
        };

        let entries = self.store.read_range(chain, from, to)?;
        Ok((entries, anchor))
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Verify `[from, to)` of `chain` against its resolved anchor.
    pub fn verify_range(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<ChainVerification> {
        let (entries, anchor) = self.anchored_range(chain, from, to)?;
        Ok(self.verifier.verify_anchored(&entries, &anchor))
    }

    /// Full integrity report for `[from, to)` of `chain`.
    ///
    /// The alert sink is notified when the report shows tampering.
    pub fn report(&self, chain: &ChainId, from: u64, to: u64) -> LedgerResult<IntegrityReport> {
        let (entries, anchor) = self.anchored_range(chain, from, to)?;
        let report = self
            .reporter
            .generate_report(&entries, &anchor, self.signer.as_ref());
        self.raise_if_tampered(&report);
        Ok(report)
    }

    /// Report on the whole of `chain`.
    pub fn audit(&self, chain: &ChainId) -> LedgerResult<IntegrityReport> {
        self.report(chain, 0, END_OF_CHAIN)
    }

    /// Like [`audit`](Self::audit), giving up once `cancel` is set.
    pub fn audit_cancellable(
        &self,
        chain: &ChainId,
        cancel: &CancellationFlag,
    ) -> LedgerResult<IntegrityReport> {
        let (entries, anchor) = self.anchored_range(chain, 0, END_OF_CHAIN)?;
        let report = self.reporter.generate_report_cancellable(
            &entries,
            &anchor,
            self.signer.as_ref(),
            cancel,
        )?;
        self.raise_if_tampered(&report);
        Ok(report)
    }

    /// Report on every chain in the store, one thread per chain.
    pub fn audit_all(&self) -> LedgerResult<Vec<(ChainId, IntegrityReport)>> {
        let chains = self.store.chains()?;
        let ranges = chains
            .iter()
            .map(|chain| self.anchored_range(chain, 0, END_OF_CHAIN))
            .collect::<LedgerResult<Vec<_>>>()?;

        let segments: Vec<Segment<'_>> = ranges
            .iter()
            .map(|(entries, anchor)| Segment {
                entries,
                anchor: anchor.clone(),
            })
            .collect();

        let reports = self.reporter.generate_many(&segments, self.signer.as_ref());
        for report in &reports {
            self.raise_if_tampered(report);
        }

        info!(chains = chains.len(), "audited all chains");
        Ok(chains.into_iter().zip(reports).collect())
    }

    fn raise_if_tampered(&self, report: &IntegrityReport) {
        if !report.is_clean() {
            self.alerts.alert(report);
        }
    }

    // ── Retention ─────────────────────────────────────────────────────────────

    /// Remove entries of `chain` older than the configured retention window.
    ///
    /// Only the contiguous prefix older than the cutoff goes; the surviving
    /// suffix stays verifiable through the store's checkpoint.  A
    /// `"Retention Purge"` entry naming `authorized_by` records every purge
    /// that removed something.
    ///
    /// # Errors
    ///
    /// `Config` when no retention period is configured or the period reaches
    /// past the earliest representable time, `Validation` when
    /// `authorized_by` is blank.
    pub fn purge_expired(&self, chain: &ChainId, authorized_by: &str) -> LedgerResult<PurgeOutcome> {
        let days = self.settings.retention_days.ok_or_else(|| LedgerError::Config {
            reason: "retention purge requested but no retention period is configured".to_string(),
        })?;
        if authorized_by.trim().is_empty() {
            return Err(LedgerError::validation("authorized_by", "must not be empty"));
        }

        let writer = self.writer_for(chain)?;
        let _guard = writer
            .lock()
            .map_err(|e| LedgerError::storage(format!("chain '{chain}' writer lock poisoned: {e}")))?;

        let now = self.clock.now();
        let cutoff = Duration::try_days(i64::from(days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| LedgerError::Config {
                reason: format!("retention period of {days} days reaches before the earliest representable time"),
            })?;
        let outcome = self.store.purge_before(chain, cutoff)?;

        if let Some(cp) = &outcome.checkpoint {
            info!(
                chain_id = %chain,
                removed = outcome.removed,
                through_sequence = cp.last_purged_sequence,
                authorized_by = %authorized_by,
                "retention purge completed"
            );
            let draft = EntryDraft::new(RETENTION_PURGE_ACTION, authorized_by).with_details(format!(
                "removed {} entries through sequence {} older than {} days (cutoff {})",
                outcome.removed,
                cp.last_purged_sequence,
                days,
                cutoff.to_rfc3339()
            ));
            self.append_locked(chain, draft)?;
        } else {
            debug!(chain_id = %chain, days, "retention purge found nothing to remove");
        }

        Ok(outcome)
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Write every surviving entry of `chain` to `out` as CSV.  Returns the
    /// number of rows written.
    pub fn export_csv<W: Write>(&self, chain: &ChainId, out: W) -> LedgerResult<usize> {
        let entries = self.store.read_range(chain, 0, END_OF_CHAIN)?;
        let rows = write_csv(&entries, out)?;
        debug!(chain_id = %chain, rows, "exported chain as CSV");
        Ok(rows)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn writer_for(&self, chain: &ChainId) -> LedgerResult<Arc<Mutex<()>>> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|e| LedgerError::storage(format!("writer table lock poisoned: {e}")))?;
        Ok(Arc::clone(writers.entry(chain.clone()).or_default()))
    }
}
