//! # ledger-store
//!
//! Append-only storage backends for the audit ledger.
//!
//! ## Overview
//!
//! Both stores implement [`LedgerStore`](ledger_core::traits::LedgerStore):
//!
//! - [`InMemoryLedgerStore`]: a `Vec` per chain behind an `RwLock`
//! - [`FileLedgerStore`]: one JSON-lines file per chain, fsynced on append
//!
//! Every append is conditional on the chain tail, every update or delete is
//! rejected with `ImmutabilityViolation`, and the only way to remove entries
//! is the retention purge, which leaves a checkpoint behind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_store::FileLedgerStore;
//! use ledger_core::traits::LedgerStore;
//!
//! let store = FileLedgerStore::open("./ledger-data")?;
//! store.append(&entry)?;
//! let entries = store.read_range(&chain, 0, u64::MAX)?;
//! ```

mod append;
pub mod file;
pub mod memory;

pub use file::FileLedgerStore;
pub use memory::InMemoryLedgerStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
