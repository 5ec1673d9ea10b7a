//! Verification, analysis, and integrity report types.
//!
//! Everything here is a finding, not a failure.  A report documenting
//! tampering is a correct result of the verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    chain::ChainId,
    error::{LedgerError, LedgerResult},
};

// ── Chain verification ────────────────────────────────────────────────────────

/// The outcome of checking one entry of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCheck {
    /// Position in the verified slice (0-indexed).
    pub index: usize,
    /// The entry's own `sequence` field.
    pub sequence: u64,
    /// Stored fields still hash to the stored `sequence_hash`.
    pub content_valid: bool,
    /// `previous_hash` matches the predecessor (or the anchor for index 0).
    pub continuity_valid: bool,
    /// `!(content_valid && continuity_valid)`.
    pub tampered: bool,
    /// The first failing check, if any.
    pub reason: Option<String>,
}

/// The outcome of walking a whole sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub all_valid: bool,
    /// Index of the first tampered entry.
    pub broken_at: Option<usize>,
    pub entries: Vec<EntryCheck>,
}

impl ChainVerification {
    /// Indices of every tampered entry.
    pub fn tampered_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|c| c.tampered)
            .map(|c| c.index)
            .collect()
    }

    pub fn content_failures(&self) -> usize {
        self.entries.iter().filter(|c| !c.content_valid).count()
    }

    pub fn continuity_failures(&self) -> usize {
        self.entries.iter().filter(|c| !c.continuity_valid).count()
    }
}

// ── Tamper patterns ───────────────────────────────────────────────────────────

/// A suspicious pattern between two consecutive entries.
///
/// `index` is the position of the later entry of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "pattern")]
pub enum TamperPattern {
    /// Entry `index - 1` claims to have happened after entry `index`.
    TimeReversal {
        index: usize,
        earlier: DateTime<Utc>,
        later: DateTime<Utc>,
    },
    /// Entry `index` does not link to entry `index - 1`.
    ChainBreak { index: usize },
    /// Entry `index` does not carry the next monotonic sequence number.
    SequenceGap {
        index: usize,
        expected: u64,
        found: u64,
    },
}

impl TamperPattern {
    pub fn index(&self) -> usize {
        match self {
            TamperPattern::TimeReversal { index, .. }
            | TamperPattern::ChainBreak { index }
            | TamperPattern::SequenceGap { index, .. } => *index,
        }
    }
}

/// Output of the tamper analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamperAnalysis {
    pub suspicious: bool,
    pub patterns: Vec<TamperPattern>,
    /// Sum of pattern counts.  A coarse heuristic, not a probability.
    pub risk_score: u32,
}

impl TamperAnalysis {
    pub fn time_reversals(&self) -> usize {
        self.patterns
            .iter()
            .filter(|p| matches!(p, TamperPattern::TimeReversal { .. }))
            .count()
    }

    pub fn chain_breaks(&self) -> usize {
        self.patterns
            .iter()
            .filter(|p| matches!(p, TamperPattern::ChainBreak { .. }))
            .count()
    }

    pub fn sequence_gaps(&self) -> usize {
        self.patterns
            .iter()
            .filter(|p| matches!(p, TamperPattern::SequenceGap { .. }))
            .count()
    }
}

// ── Signatures ────────────────────────────────────────────────────────────────

/// The result of checking one entry's HMAC signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureCheck {
    pub valid: bool,
    /// `None` when valid, otherwise "signature mismatch".
    pub reason: Option<String>,
    /// Operator-facing explanation of what exactly did not match.
    pub detail: Option<String>,
}

impl SignatureCheck {
    pub const MISMATCH: &'static str = "signature mismatch";

    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
            detail: None,
        }
    }

    pub fn mismatch(detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(Self::MISMATCH.to_string()),
            detail: Some(detail.into()),
        }
    }
}

/// A failed signature check, located in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureFailure {
    pub index: usize,
    pub sequence: u64,
    pub check: SignatureCheck,
}

// ── Integrity report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Recommendation strings emitted by the integrity reporter.
pub mod recommendation {
    pub const NO_TAMPERING: &str = "no tampering detected";
    pub const INVESTIGATE_TAMPERED: &str = "investigate tampered entries";
    pub const CHAIN_BROKEN: &str = "chain integrity broken — possible deletion/reordering";
    pub const TIMESTAMP_PATTERN: &str = "suspicious timestamp pattern — manual review";
    pub const SIGNATURE_MISMATCH: &str =
        "signature mismatch — entries altered outside the trusted boundary";
}

/// A risk-scored assessment of one slice of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Taken from the first entry; `None` for an empty slice.
    pub chain_id: Option<ChainId>,
    pub generated_at: DateTime<Utc>,
    pub total_entries: usize,
    pub verification: ChainVerification,
    pub analysis: TamperAnalysis,
    /// Empty unless the report was generated with a signer.
    pub signature_failures: Vec<SignatureFailure>,
    pub signatures_checked: bool,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl IntegrityReport {
    /// True when neither the chain, the patterns, nor the signatures flagged anything.
    pub fn is_clean(&self) -> bool {
        self.verification.all_valid && !self.analysis.suspicious && self.signature_failures.is_empty()
    }

    /// Turn a report that found tampering into `ChainIntegrityFailure`.
    ///
    /// For callers that want verification findings on the error path.
    pub fn ensure_intact(&self) -> LedgerResult<()> {
        if self.is_clean() {
            return Ok(());
        }

        let broken_at = self
            .verification
            .broken_at
            .or_else(|| self.analysis.patterns.first().map(|p| p.index()))
            .or_else(|| self.signature_failures.first().map(|f| f.index))
            .unwrap_or(0);

        Err(LedgerError::ChainIntegrityFailure {
            chain_id: self
                .chain_id
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            broken_at,
            reason: self.recommendations.join("; "),
        })
    }
}
