//! Scenario 2: Tampering with the Files
//!
//! Three stock movements are written to a JSON-lines store, then an attacker
//! with file-system access tries three different edits:
//!
//! Sub-case A: change the quantity in the middle entry       → content check fails
//! Sub-case B: delete the middle line                        → continuity check fails
//! Sub-case C: edit and re-hash the whole chain after it     → only the HMAC catches it
//!
//! Each sub-case starts from a fresh copy of the untouched ledger.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use ledger_contracts::{report::IntegrityReport, ChainId, LedgerEntry, LedgerResult};
use ledger_core::{hash_entry, EntrySigner, SignatureKey};
use ledger_runtime::{Ledger, LedgerSettings};
use ledger_store::FileLedgerStore;

use crate::{events::ASSETS_CHAIN, mock_data::stock_movements};

use super::expect;

/// Demo key; a real deployment reads it from the environment.
const DEMO_SECRET: &[u8] = b"reference-inventory-demo-secret";

fn signer() -> LedgerResult<EntrySigner> {
    EntrySigner::new(&SignatureKey::from_bytes(DEMO_SECRET)?)
}

fn open(dir: &Path) -> LedgerResult<(Ledger, PathBuf)> {
    let store = FileLedgerStore::open(dir)?;
    let path = store.chain_path(&ChainId::new(ASSETS_CHAIN)?);
    let ledger = Ledger::new(Arc::new(store), LedgerSettings::default()).with_signer(signer()?);
    Ok((ledger, path))
}

/// Write the three movements into a fresh store under `dir`.
fn seed(dir: &Path) -> LedgerResult<PathBuf> {
    let (ledger, path) = open(dir)?;
    let chain = ChainId::new(ASSETS_CHAIN)?;
    for event in stock_movements() {
        ledger.append(&chain, event.draft()?)?;
    }
    Ok(path)
}

fn read_lines(path: &Path) -> LedgerResult<Vec<String>> {
    Ok(fs::read_to_string(path)?.lines().map(str::to_string).collect())
}

fn write_lines(path: &Path, lines: &[String]) -> LedgerResult<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents)?;
    Ok(())
}

fn audit(dir: &Path) -> LedgerResult<IntegrityReport> {
    let (ledger, _) = open(dir)?;
    ledger.audit(&ChainId::new(ASSETS_CHAIN)?)
}

fn print_report(report: &IntegrityReport) {
    for check in &report.verification.entries {
        println!(
            "    entry {}: content={} continuity={}{}",
            check.index,
            if check.content_valid { "ok" } else { "FAIL" },
            if check.continuity_valid { "ok" } else { "FAIL" },
            check
                .reason
                .as_ref()
                .map(|r| format!("  ({r})"))
                .unwrap_or_default()
        );
    }
    for failure in &report.signature_failures {
        println!("    entry {}: signature FAIL", failure.index);
    }
    println!("    risk: {} (score {})", report.risk_level, report.risk_score);
    for rec in &report.recommendations {
        println!("    -> {rec}");
    }
    println!();
}

pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 2: Tampering with the Files ===");
    println!();

    // ── Baseline ──────────────────────────────────────────────────────────────

    let baseline = tempfile::tempdir()?;
    seed(baseline.path())?;
    let report = audit(baseline.path())?;
    println!("  Baseline: {} entries, clean = {}", report.total_entries, report.is_clean());
    expect(report.is_clean(), "a clean baseline")?;
    println!();

    // ── Sub-case A: edit a field in place ─────────────────────────────────────

    println!("  Sub-case A: change \"delta\":-15 to \"delta\":-1 in entry 1");
    let dir = tempfile::tempdir()?;
    let path = seed(dir.path())?;
    let mut lines = read_lines(&path)?;
    lines[1] = lines[1].replacen(r#"\"delta\":-15"#, r#"\"delta\":-1"#, 1);
    write_lines(&path, &lines)?;

    let report = audit(dir.path())?;
    print_report(&report);
    let checks = &report.verification.entries;
    expect(!checks[1].content_valid, "entry 1 to fail its content check")?;
    expect(checks[2].continuity_valid, "entry 2 to still link to the stored hash")?;

    // ── Sub-case B: delete a line ─────────────────────────────────────────────

    println!("  Sub-case B: delete entry 1");
    let dir = tempfile::tempdir()?;
    let path = seed(dir.path())?;
    let mut lines = read_lines(&path)?;
    lines.remove(1);
    write_lines(&path, &lines)?;

    let report = audit(dir.path())?;
    print_report(&report);
    expect(
        report.verification.broken_at == Some(1),
        "the chain to break where the entry was removed",
    )?;
    expect(report.analysis.sequence_gaps() == 1, "one sequence gap")?;

    // ── Sub-case C: rewrite and re-hash ───────────────────────────────────────

    println!("  Sub-case C: rewrite entry 0 and recompute every hash after it");
    let dir = tempfile::tempdir()?;
    let path = seed(dir.path())?;
    let mut entries: Vec<LedgerEntry> = read_lines(&path)?
        .iter()
        .map(|line| serde_json::from_str(line))
        .collect::<Result<_, _>>()?;

    entries[0].details = entries[0]
        .details
        .as_ref()
        .map(|d| d.replace("\"delta\":40", "\"delta\":400"));
    let mut previous: Option<String> = None;
    for entry in &mut entries {
        if let Some(prev) = previous.take() {
            entry.previous_hash = prev;
        }
        entry.sequence_hash = hash_entry(entry);
        previous = Some(entry.sequence_hash.clone());
    }
    let lines = entries
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    write_lines(&path, &lines)?;

    let report = audit(dir.path())?;
    print_report(&report);
    expect(report.verification.all_valid, "the re-hashed chain to pass hash checks")?;
    expect(
        !report.signature_failures.is_empty(),
        "the signature check to catch the rewrite",
    )?;

    println!("  Result: every edit detected");
    println!();
    Ok(())
}
