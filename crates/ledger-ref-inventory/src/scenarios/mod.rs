//! Inventory reference scenarios.
//!
//! Each scenario wires a real `Ledger` to mock inventory activity and
//! demonstrates one guarantee.  A scenario returns `Err` if the guarantee it
//! demonstrates does not hold.

pub mod concurrent_appends;
pub mod retention_purge;
pub mod sequential_appends;
pub mod tamper_detection;

use ledger_contracts::{LedgerError, LedgerResult};

/// Run every scenario in order, stopping at the first failure.
pub fn run_all() -> LedgerResult<()> {
    sequential_appends::run_scenario()?;
    tamper_detection::run_scenario()?;
    concurrent_appends::run_scenario()?;
    retention_purge::run_scenario()?;
    Ok(())
}

/// Fail the scenario unless `holds`.
pub(crate) fn expect(holds: bool, what: &str) -> LedgerResult<()> {
    if holds {
        Ok(())
    } else {
        Err(LedgerError::validation("scenario", format!("expected {what}")))
    }
}

/// First 12 hex characters of a hash, for display.
pub(crate) fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
