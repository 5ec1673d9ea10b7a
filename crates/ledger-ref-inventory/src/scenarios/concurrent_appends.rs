//! Scenario 3: Many Handheld Scanners, One Chain
//!
//! Several scanner stations append stock adjustments to the same chain at
//! once.  The ledger serializes them: the chain comes out linear, with dense
//! sequence numbers and no forks.

use std::{collections::HashSet, sync::Arc};

use ledger_contracts::{ChainId, LedgerResult};
use ledger_runtime::{Ledger, LedgerSettings};
use ledger_store::InMemoryLedgerStore;

use crate::{events::ASSETS_CHAIN, mock_data::worker_adjustment};

use super::expect;

const STATIONS: usize = 6;
const SCANS_PER_STATION: usize = 50;

pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 3: Many Handheld Scanners, One Chain ===");
    println!();

    let ledger = Ledger::new(Arc::new(InMemoryLedgerStore::new()), LedgerSettings::default());
    let chain = ChainId::new(ASSETS_CHAIN)?;

    println!(
        "  {} stations x {} scans appending to '{}' concurrently",
        STATIONS, SCANS_PER_STATION, chain
    );

    let results: Vec<LedgerResult<usize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..STATIONS)
            .map(|station| {
                let ledger = &ledger;
                let chain = &chain;
                scope.spawn(move || -> LedgerResult<usize> {
                    for n in 0..SCANS_PER_STATION {
                        ledger.append(chain, worker_adjustment(station, n).draft()?)?;
                    }
                    Ok(SCANS_PER_STATION)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    let mut appended = 0;
    for result in results {
        appended += result?;
    }

    let entries = ledger.read_range(&chain, 0, u64::MAX)?;
    let distinct: HashSet<u64> = entries.iter().map(|e| e.sequence).collect();
    let dense = entries
        .iter()
        .enumerate()
        .all(|(i, e)| e.sequence == i as u64);

    println!("  Appended:            {}", appended);
    println!("  Entries in chain:    {}", entries.len());
    println!("  Distinct sequences:  {}", distinct.len());
    println!("  Dense and ordered:   {}", dense);

    expect(entries.len() == STATIONS * SCANS_PER_STATION, "every scan on the chain")?;
    expect(distinct.len() == entries.len(), "no duplicated sequence numbers")?;
    expect(dense, "sequence numbers 0..n in order")?;

    let report = ledger.audit(&chain)?;
    println!("  Audit:               risk {} ({})", report.risk_level, report.recommendations.join("; "));
    report.ensure_intact()?;

    println!();
    println!("  Result: one linear chain, no forks");
    println!();
    Ok(())
}
