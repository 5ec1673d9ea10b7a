//! Simulated inventory-application activity for the reference scenarios.
//!
//! All users, assets, and addresses here are fictional.

use crate::events::InventoryEvent;

pub const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// A morning at the warehouse: logins, checkouts, stock counts, a denied
/// admin route, and the nightly job report.
pub fn workday() -> Vec<InventoryEvent> {
    vec![
        InventoryEvent::UserLogin {
            username: "alice".to_string(),
            ip: "10.20.0.14".to_string(),
        },
        InventoryEvent::AssetCheckedOut {
            asset_tag: "LT-0042".to_string(),
            username: "alice".to_string(),
            location: "Dock B".to_string(),
        },
        InventoryEvent::LoginFailed {
            username: "dave".to_string(),
            ip: "203.0.113.9".to_string(),
            attempts: 3,
        },
        InventoryEvent::UserLogin {
            username: "bob".to_string(),
            ip: "10.20.0.31".to_string(),
        },
        InventoryEvent::StockAdjusted {
            sku: "CBL-USBC-2M".to_string(),
            delta: -12,
            adjusted_by: "bob".to_string(),
            reason: "cycle count, shelf 4".to_string(),
        },
        InventoryEvent::PermissionDenied {
            username: "bob".to_string(),
            permission: "roles.manage".to_string(),
            route: "/admin/roles".to_string(),
        },
        InventoryEvent::RoleGranted {
            granted_by: "carol".to_string(),
            username: "bob".to_string(),
            role: "stock-supervisor".to_string(),
        },
        InventoryEvent::TicketOpened {
            ticket_id: 1187,
            opened_by: "alice".to_string(),
            subject: "Scanner on Dock B drops connection".to_string(),
        },
        InventoryEvent::AssetReturned {
            asset_tag: "LT-0042".to_string(),
            username: "alice".to_string(),
        },
        InventoryEvent::UserLogout {
            username: "alice".to_string(),
        },
        InventoryEvent::JobCompleted {
            job: "nightly-stock-snapshot".to_string(),
            processed: 1_204,
        },
    ]
}

/// The three stock movements used by the tamper scenario.
pub fn stock_movements() -> Vec<InventoryEvent> {
    [
        ("PLT-EURO", 40, "inbound PO-7731"),
        ("PLT-EURO", -15, "picked for SO-2210"),
        ("PLT-EURO", -5, "damaged in transit"),
    ]
    .into_iter()
    .map(|(sku, delta, reason)| InventoryEvent::StockAdjusted {
        sku: sku.to_string(),
        delta,
        adjusted_by: "bob".to_string(),
        reason: reason.to_string(),
    })
    .collect()
}

/// A stock adjustment made by worker `worker` on its `n`th pass.
pub fn worker_adjustment(worker: usize, n: usize) -> InventoryEvent {
    InventoryEvent::StockAdjusted {
        sku: format!("SKU-{:04}", n % 50),
        delta: if n % 3 == 0 { -1 } else { 1 },
        adjusted_by: USERS[worker % USERS.len()].to_string(),
        reason: format!("handheld scan #{n} from station {worker}"),
    }
}
