//! Integrity reporting: verification and pattern analysis rolled into one
//! risk-scored report with remediation guidance.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ledger_contracts::{
    report::{
        recommendation, ChainVerification, IntegrityReport, RiskLevel, SignatureFailure,
        TamperAnalysis,
    },
    ChainAnchor, LedgerEntry, LedgerResult,
};
use ledger_core::EntrySigner;

use crate::{cancel::CancellationFlag, chain::ChainVerifier, tamper::TamperAnalyzer};

/// Score thresholds for `RiskLevel`.  Policy, not derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskThresholds {
    /// Scores strictly above this are HIGH.
    pub high_above: u32,
    /// Scores strictly above this (and not HIGH) are MEDIUM.
    pub medium_above: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_above: 5,
            medium_above: 2,
        }
    }
}

impl RiskThresholds {
    pub fn level_for(&self, score: u32) -> RiskLevel {
        if score > self.high_above {
            RiskLevel::High
        } else if score > self.medium_above {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// One independently reportable slice of a chain.
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    pub entries: &'a [LedgerEntry],
    pub anchor: ChainAnchor,
}

/// Combines `ChainVerifier` and `TamperAnalyzer` output into an
/// `IntegrityReport`.
///
/// Side-effect-free apart from logging; safe to run repeatedly and in
/// parallel over disjoint ranges.
#[derive(Debug, Default, Clone)]
pub struct IntegrityReporter {
    thresholds: RiskThresholds,
    verifier: ChainVerifier,
    analyzer: TamperAnalyzer,
}

impl IntegrityReporter {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self {
            thresholds,
            verifier: ChainVerifier::new(),
            analyzer: TamperAnalyzer::new(),
        }
    }

    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    /// Assess `entries`, whose first entry must link to `anchor`.
    ///
    /// When `signer` is given, every entry's signature is checked too.
    pub fn generate_report(
        &self,
        entries: &[LedgerEntry],
        anchor: &ChainAnchor,
        signer: Option<&EntrySigner>,
    ) -> IntegrityReport {
        let verification = self.verifier.verify_anchored(entries, anchor);
        self.assemble(entries, verification, signer)
    }

    /// Like [`generate_report`](Self::generate_report), abandoning the chain
    /// scan once `cancel` is set.
    pub fn generate_report_cancellable(
        &self,
        entries: &[LedgerEntry],
        anchor: &ChainAnchor,
        signer: Option<&EntrySigner>,
        cancel: &CancellationFlag,
    ) -> LedgerResult<IntegrityReport> {
        let verification = self.verifier.verify_cancellable(entries, anchor, cancel)?;
        Ok(self.assemble(entries, verification, signer))
    }

    /// Report on several disjoint segments at once, one scoped thread each.
    ///
    /// Reports come back in segment order.
    pub fn generate_many(
        &self,
        segments: &[Segment<'_>],
        signer: Option<&EntrySigner>,
    ) -> Vec<IntegrityReport> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = segments
                .iter()
                .map(|segment| {
                    scope.spawn(move || self.generate_report(segment.entries, &segment.anchor, signer))
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
        })
    }

    fn assemble(
        &self,
        entries: &[LedgerEntry],
        verification: ChainVerification,
        signer: Option<&EntrySigner>,
    ) -> IntegrityReport {
        let analysis = self.analyzer.detect_patterns(entries);

        let signature_failures: Vec<SignatureFailure> = match signer {
            Some(signer) => entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    let check = signer.verify(entry);
                    (!check.valid).then(|| SignatureFailure {
                        index,
                        sequence: entry.sequence,
                        check,
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let content_failures = verification.content_failures();
        let risk_score = analysis
            .risk_score
            .saturating_add(count(content_failures))
            .saturating_add(count(signature_failures.len()));

        // A failed check of any kind is at least MEDIUM.
        let mut risk_level = self.thresholds.level_for(risk_score);
        let altered = content_failures > 0
            || verification.continuity_failures() > 0
            || !signature_failures.is_empty();
        if altered && risk_level < RiskLevel::Medium {
            risk_level = RiskLevel::Medium;
        }

        let recommendations =
            recommendations_for(&verification, &analysis, !signature_failures.is_empty());

        let report = IntegrityReport {
            chain_id: entries.first().map(|e| e.chain_id.clone()),
            generated_at: Utc::now(),
            total_entries: entries.len(),
            verification,
            analysis,
            signature_failures,
            signatures_checked: signer.is_some(),
            risk_score,
            risk_level,
            recommendations,
        };

        if report.is_clean() {
            info!(
                chain_id = ?report.chain_id,
                entries = report.total_entries,
                "integrity report: no tampering detected"
            );
        } else {
            warn!(
                chain_id = ?report.chain_id,
                entries = report.total_entries,
                risk_score = report.risk_score,
                risk_level = %report.risk_level,
                broken_at = ?report.verification.broken_at,
                "integrity report found tampering"
            );
        }

        report
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn recommendations_for(
    verification: &ChainVerification,
    analysis: &TamperAnalysis,
    signature_mismatch: bool,
) -> Vec<String> {
    let mut out = Vec::new();

    if verification.content_failures() > 0 {
        out.push(recommendation::INVESTIGATE_TAMPERED);
    }
    if verification.continuity_failures() > 0 || analysis.chain_breaks() > 0 || analysis.sequence_gaps() > 0 {
        out.push(recommendation::CHAIN_BROKEN);
    }
    if analysis.time_reversals() > 0 {
        out.push(recommendation::TIMESTAMP_PATTERN);
    }
    if signature_mismatch {
        out.push(recommendation::SIGNATURE_MISMATCH);
    }
    if out.is_empty() {
        out.push(recommendation::NO_TAMPERING);
    }

    out.into_iter().map(str::to_string).collect()
}
