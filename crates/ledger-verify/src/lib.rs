//! # ledger-verify
//!
//! Read-side engine for the audit ledger: detects whether a chain has been
//! altered after the fact.
//!
//! ## Overview
//!
//! - [`ChainVerifier`]: recomputes every `sequence_hash` and checks every
//!   `previous_hash` link, reporting per-entry results
//! - [`TamperAnalyzer`]: flags time reversals, chain breaks, and sequence gaps
//!   between consecutive entries
//! - [`IntegrityReporter`]: combines both (plus optional HMAC checks) into a
//!   risk-scored [`IntegrityReport`](ledger_contracts::report::IntegrityReport)
//!
//! Findings are data: a report describing tampering is a successful result.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use ledger_verify::{IntegrityReporter, RiskThresholds};
//! use ledger_contracts::ChainAnchor;
//!
//! let report = IntegrityReporter::new(RiskThresholds::default())
//!     .generate_report(&entries, &ChainAnchor::Genesis, None);
//! println!("{}: {:?}", report.risk_level, report.recommendations);
//! ```

pub mod cancel;
pub mod chain;
pub mod report;
pub mod tamper;

pub use cancel::CancellationFlag;
pub use chain::ChainVerifier;
pub use report::{IntegrityReporter, RiskThresholds, Segment};
pub use tamper::TamperAnalyzer;

// ── Tests ─────────────────────────────────────────────────────────────────────
