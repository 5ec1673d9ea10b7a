//! Security-relevant events raised by the inventory application.
//!
//! Each producer (login handler, RBAC middleware, asset controller, scheduled
//! job) builds one of these and hands the resulting draft to the ledger.  The
//! event's fields become the entry's `details` as compact JSON.

use serde::{Deserialize, Serialize};

use ledger_contracts::{EntryDraft, LedgerError, LedgerResult};

/// Chain for authentication and authorization events.
pub const AUTH_CHAIN: &str = "auth";
/// Chain for asset and stock movements.
pub const ASSETS_CHAIN: &str = "assets";
/// Chain for helpdesk tickets and scheduled jobs.
pub const OPERATIONS_CHAIN: &str = "operations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum InventoryEvent {
    UserLogin {
        username: String,
        ip: String,
    },
    LoginFailed {
        username: String,
        ip: String,
        attempts: u32,
    },
    UserLogout {
        username: String,
    },
    RoleGranted {
        granted_by: String,
        username: String,
        role: String,
    },
    PermissionDenied {
        username: String,
        permission: String,
        route: String,
    },
    AssetCheckedOut {
        asset_tag: String,
        username: String,
        location: String,
    },
    AssetReturned {
        asset_tag: String,
        username: String,
    },
    StockAdjusted {
        sku: String,
        delta: i64,
        adjusted_by: String,
        reason: String,
    },
    TicketOpened {
        ticket_id: u32,
        opened_by: String,
        subject: String,
    },
    JobCompleted {
        job: String,
        processed: u32,
    },
}

impl InventoryEvent {
    /// The ledger `action` recorded for this event.
    pub fn action(&self) -> &'static str {
        match self {
            InventoryEvent::UserLogin { .. } => "User Login",
            InventoryEvent::LoginFailed { .. } => "Login Failed",
            InventoryEvent::UserLogout { .. } => "User Logout",
            InventoryEvent::RoleGranted { .. } => "Role Granted",
            InventoryEvent::PermissionDenied { .. } => "Permission Denied",
            InventoryEvent::AssetCheckedOut { .. } => "Asset Checked Out",
            InventoryEvent::AssetReturned { .. } => "Asset Returned",
            InventoryEvent::StockAdjusted { .. } => "Stock Adjusted",
            InventoryEvent::TicketOpened { .. } => "Ticket Opened",
            InventoryEvent::JobCompleted { .. } => "Scheduled Job Completed",
        }
    }

    /// Who performed it.  Scheduled jobs act as `system`.
    pub fn performed_by(&self) -> &str {
        match self {
            InventoryEvent::UserLogin { username, .. }
            | InventoryEvent::LoginFailed { username, .. }
            | InventoryEvent::UserLogout { username }
            | InventoryEvent::PermissionDenied { username, .. }
            | InventoryEvent::AssetCheckedOut { username, .. }
            | InventoryEvent::AssetReturned { username, .. } => username.as_str(),
            InventoryEvent::RoleGranted { granted_by, .. } => granted_by.as_str(),
            InventoryEvent::StockAdjusted { adjusted_by, .. } => adjusted_by.as_str(),
            InventoryEvent::TicketOpened { opened_by, .. } => opened_by.as_str(),
            InventoryEvent::JobCompleted { .. } => "system",
        }
    }

    /// Client address, for events that came in over the network.
    pub fn origin(&self) -> Option<&str> {
        match self {
            InventoryEvent::UserLogin { ip, .. } | InventoryEvent::LoginFailed { ip, .. } => {
                Some(ip.as_str())
            }
            InventoryEvent::PermissionDenied { route, .. } => Some(route.as_str()),
            _ => None,
        }
    }

    /// Which chain the event belongs on.
    pub fn chain(&self) -> &'static str {
        match self {
            InventoryEvent::UserLogin { .. }
            | InventoryEvent::LoginFailed { .. }
            | InventoryEvent::UserLogout { .. }
            | InventoryEvent::RoleGranted { .. }
            | InventoryEvent::PermissionDenied { .. } => AUTH_CHAIN,
            InventoryEvent::AssetCheckedOut { .. }
            | InventoryEvent::AssetReturned { .. }
            | InventoryEvent::StockAdjusted { .. } => ASSETS_CHAIN,
            InventoryEvent::TicketOpened { .. } | InventoryEvent::JobCompleted { .. } => {
                OPERATIONS_CHAIN
            }
        }
    }

    /// Build the ledger draft for this event.
    pub fn draft(&self) -> LedgerResult<EntryDraft> {
        let details = serde_json::to_string(self)
            .map_err(|e| LedgerError::validation("details", format!("unserializable event: {e}")))?;
        let mut draft = EntryDraft::new(self.action(), self.performed_by()).with_details(details);
        if let Some(origin) = self.origin() {
            draft = draft.with_origin(origin);
        }
        Ok(draft)
    }
}
