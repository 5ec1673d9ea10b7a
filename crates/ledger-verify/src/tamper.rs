//! Forensic pattern detection over consecutive entries.
//!
//! The analyzer looks for evidence beyond a bare hash mismatch: clocks running
//! backwards, links that skip, and sequence numbers that jump or repeat.  It
//! is a pure function of its input and never touches storage.

use tracing::debug;

use ledger_contracts::{
    report::{TamperAnalysis, TamperPattern},
    LedgerEntry,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct TamperAnalyzer;

impl TamperAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scan every consecutive pair of `entries`.
    ///
    /// For each pair `(i-1, i)` up to three patterns may be reported, each
    /// counted once toward `risk_score`.
    pub fn detect_patterns(&self, entries: &[LedgerEntry]) -> TamperAnalysis {
        let mut patterns = Vec::new();

        for (offset, pair) in entries.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let index = offset + 1;

            if prev.occurred_at > next.occurred_at {
                patterns.push(TamperPattern::TimeReversal {
                    index,
                    earlier: prev.occurred_at,
                    later: next.occurred_at,
                });
            }

            if next.previous_hash != prev.sequence_hash {
                patterns.push(TamperPattern::ChainBreak { index });
            }

            let expected = prev.sequence.saturating_add(1);
            if next.sequence != expected {
                patterns.push(TamperPattern::SequenceGap {
                    index,
                    expected,
                    found: next.sequence,
                });
            }
        }

        let risk_score = u32::try_from(patterns.len()).unwrap_or(u32::MAX);
        if !patterns.is_empty() {
            debug!(patterns = patterns.len(), risk_score, "tamper patterns detected");
        }

        TamperAnalysis {
            suspicious: !patterns.is_empty(),
            patterns,
            risk_score,
        }
    }
}
