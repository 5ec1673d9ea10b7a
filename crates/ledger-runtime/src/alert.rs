use tracing::error;

use ledger_contracts::report::IntegrityReport;
use ledger_core::AlertSink;

/// Raises tamper alerts as `error!` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, report: &IntegrityReport) {
        let chain_id = report
            .chain_id
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();
        error!(
            chain_id = %chain_id,
            risk_level = %report.risk_level,
            risk_score = report.risk_score,
            tampered = ?report.verification.tampered_indices(),
            signature_failures = report.signature_failures.len(),
            recommendations = ?report.recommendations,
            "ledger integrity alert"
        );
    }
}
