//! # ledger-ref-inventory
//!
//! Inventory-application reference runtime for the tamper-evident audit ledger.
//!
//! The inventory app's producers (login handler, RBAC middleware, asset
//! controller, scheduled jobs) raise [`InventoryEvent`]s; each event knows its
//! chain and builds its own draft.  Four scenarios exercise the ledger with
//! mock data:
//!
//! 1. **A Workday on the Ledger**: events routed onto three chains and audited.
//! 2. **Tampering with the Files**: in-place edit, deletion, and a full
//!    re-hash of the JSON-lines store, each detected.
//! 3. **Many Handheld Scanners**: concurrent appends producing one linear chain.
//! 4. **Retention and Immutability**: refused deletes and an authorized purge.
//!
//! All data is hardcoded and fictional.

pub mod events;
pub mod mock_data;
pub mod scenarios;

pub use events::{InventoryEvent, ASSETS_CHAIN, AUTH_CHAIN, OPERATIONS_CHAIN};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use ledger_contracts::ChainId;

    use super::*;

    #[test]
    fn test_event_drafts() {
        let event = InventoryEvent::LoginFailed {
            username: "dave".to_string(),
            ip: "203.0.113.9".to_string(),
            attempts: 3,
        };
        let draft = event.draft().unwrap();

        assert_eq!(draft.action, "Login Failed");
        assert_eq!(draft.performed_by, "dave");
        assert_eq!(draft.origin.as_deref(), Some("203.0.113.9"));
        let details = draft.details.unwrap();
        assert!(details.contains("\"event\":\"login_failed\""), "{details}");
        assert!(details.contains("\"attempts\":3"), "{details}");
    }

    #[test]
    fn test_event_details_round_trip() {
        for event in mock_data::workday() {
            let details = event.draft().unwrap().details.unwrap();
            let parsed: InventoryEvent = serde_json::from_str(&details).unwrap();
            assert_eq!(parsed, event);
        }
    }

    #[test]
    fn test_scheduled_jobs_act_as_system() {
        let event = InventoryEvent::JobCompleted {
            job: "nightly-stock-snapshot".to_string(),
            processed: 10,
        };
        assert_eq!(event.performed_by(), "system");
        assert_eq!(event.chain(), OPERATIONS_CHAIN);
        assert!(event.origin().is_none());
    }

    #[test]
    fn test_workday_routes_to_valid_chains() {
        let chains: BTreeSet<&str> = mock_data::workday().iter().map(|e| e.chain()).collect();
        assert_eq!(chains.len(), 3, "workday should touch every chain");
        for name in chains {
            ChainId::new(name).unwrap();
        }
    }

    // ── Scenarios ─────────────────────────────────────────────────────────────

    #[test]
    fn test_sequential_appends_scenario() {
        scenarios::sequential_appends::run_scenario().unwrap();
    }

    #[test]
    fn test_tamper_detection_scenario() {
        scenarios::tamper_detection::run_scenario().unwrap();
    }

    #[test]
    fn test_concurrent_appends_scenario() {
        scenarios::concurrent_appends::run_scenario().unwrap();
    }

    #[test]
    fn test_retention_purge_scenario() {
        scenarios::retention_purge::run_scenario().unwrap();
    }
}
