//! Scenario 1: A Workday on the Ledger
//!
//! Routes a morning of inventory events onto their chains (auth, assets,
//! operations), prints each chain, and audits all three in parallel.

use std::sync::Arc;

use ledger_contracts::{ChainId, LedgerResult};
use ledger_runtime::{Ledger, LedgerSettings};
use ledger_store::InMemoryLedgerStore;

use crate::mock_data::workday;

use super::{expect, short};

pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 1: A Workday on the Ledger ===");
    println!();

    let ledger = Ledger::new(Arc::new(InMemoryLedgerStore::new()), LedgerSettings::default());

    // ── Producers append as events happen ─────────────────────────────────────

    let events = workday();
    for event in &events {
        let chain = ChainId::new(event.chain())?;
        ledger.append(&chain, event.draft()?)?;
    }
    println!("  Appended {} events", events.len());
    println!();

    for chain in ledger.chains()? {
        println!("  Chain '{}':", chain);
        for entry in ledger.read_range(&chain, 0, u64::MAX)? {
            println!(
                "    #{:<3} {:<24} {:<8} prev={}  hash={}",
                entry.sequence,
                entry.action,
                entry.performed_by,
                short(&entry.previous_hash),
                short(&entry.sequence_hash)
            );
        }
        println!();
    }

    // ── Auditor checks every chain ────────────────────────────────────────────

    let reports = ledger.audit_all()?;
    for (chain, report) in &reports {
        println!(
            "  Audit '{}': {} entries, risk {} ({}), {}",
            chain,
            report.total_entries,
            report.risk_level,
            report.risk_score,
            report.recommendations.join("; ")
        );
        report.ensure_intact()?;
    }

    let audited: usize = reports.iter().map(|(_, r)| r.total_entries).sum();
    expect(audited == events.len(), "every event to be audited")?;

    println!();
    println!("  Result: all chains intact");
    println!();
    Ok(())
}
