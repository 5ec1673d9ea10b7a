//! Scenario 4: Retention and Immutability
//!
//! A quarter of login events is recorded on a simulated clock, then:
//!
//! Sub-case A: an operator tries to delete an entry      → refused, and the attempt is recorded
//! Sub-case B: the DPO purges entries past 90 days       → prefix removed, suffix still verifies
//! Sub-case C: purge without a retention period          → refused with a config error

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use ledger_contracts::{ChainId, LedgerError, LedgerResult};
use ledger_core::{Clock, ManualClock};
use ledger_runtime::{Ledger, LedgerSettings, IMMUTABILITY_VIOLATION_ACTION};
use ledger_store::InMemoryLedgerStore;
use ledger_verify::RiskThresholds;

use crate::{
    events::{InventoryEvent, AUTH_CHAIN},
    mock_data::USERS,
};

use super::{expect, short};

const RETENTION_DAYS: u32 = 90;

pub fn run_scenario() -> LedgerResult<()> {
    println!("=== Scenario 4: Retention and Immutability ===");
    println!();

    let start = Utc
        .with_ymd_and_hms(2024, 1, 2, 8, 0, 0)
        .single()
        .ok_or_else(|| LedgerError::validation("start", "ambiguous scenario start time"))?;
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(InMemoryLedgerStore::new());
    let settings = LedgerSettings {
        thresholds: RiskThresholds::default(),
        retention_days: Some(RETENTION_DAYS),
    };
    let ledger = Ledger::new(store.clone(), settings).with_clock(clock.clone());
    let chain = ChainId::new(AUTH_CHAIN)?;

    // One login every 10 days for 120 days.
    for day in 0..12 {
        let event = InventoryEvent::UserLogin {
            username: USERS[day % USERS.len()].to_string(),
            ip: format!("10.20.0.{}", 10 + day),
        };
        ledger.append(&chain, event.draft()?)?;
        clock.advance(Duration::days(10));
    }
    println!(
        "  Recorded 12 logins between {} and {}",
        start.date_naive(),
        clock.now().date_naive()
    );
    println!();

    // ── Sub-case A: delete attempt ────────────────────────────────────────────

    println!("  Sub-case A: operator 'dave' asks the store to delete sequence 3");
    match ledger.delete(&chain, 3, "dave") {
        Err(LedgerError::ImmutabilityViolation { .. }) => println!("    refused: ImmutabilityViolation"),
        other => {
            return Err(LedgerError::validation(
                "scenario",
                format!("expected ImmutabilityViolation, got {other:?}"),
            ))
        }
    }
    let recorded = ledger.read_range(&chain, 12, 13)?;
    expect(
        recorded.first().map(|e| e.action.as_str()) == Some(IMMUTABILITY_VIOLATION_ACTION),
        "the refusal to be on the chain",
    )?;
    println!("    recorded as entry #12 by '{}'", recorded[0].performed_by);
    println!();

    // ── Sub-case B: authorized purge ──────────────────────────────────────────

    println!("  Sub-case B: 'dpo' purges entries older than {RETENTION_DAYS} days");
    let outcome = ledger.purge_expired(&chain, "dpo")?;
    let checkpoint = outcome
        .checkpoint
        .as_ref()
        .ok_or_else(|| LedgerError::validation("scenario", "expected a purge checkpoint"))?;
    println!("    removed {} entries", outcome.removed);
    println!(
        "    checkpoint: sequence {} hash {}",
        checkpoint.last_purged_sequence,
        short(&checkpoint.last_purged_hash)
    );

    let surviving = ledger.read_range(&chain, 0, u64::MAX)?;
    println!(
        "    surviving: sequences {}..={}",
        surviving.first().map(|e| e.sequence).unwrap_or(0),
        surviving.last().map(|e| e.sequence).unwrap_or(0)
    );
    let report = ledger.audit(&chain)?;
    println!("    audit: risk {} ({})", report.risk_level, report.recommendations.join("; "));
    report.ensure_intact()?;
    expect(outcome.removed > 0, "old entries to be removed")?;
    println!();

    // ── Sub-case C: no retention configured ───────────────────────────────────

    println!("  Sub-case C: purge on a ledger with no retention period");
    let unbounded = Ledger::new(store, LedgerSettings::default());
    match unbounded.purge_expired(&chain, "dpo") {
        Err(LedgerError::Config { reason }) => println!("    refused: {reason}"),
        other => {
            return Err(LedgerError::validation(
                "scenario",
                format!("expected a config error, got {other:?}"),
            ))
        }
    }

    println!();
    println!("  Result: history only shrinks through an authorized, recorded purge");
    println!();
    Ok(())
}
