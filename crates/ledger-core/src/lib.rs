//! # ledger-core
//!
//! Write-side primitives for the tamper-evident audit ledger.
//!
//! This crate provides:
//! - The collaborator traits (`LedgerStore`, `Clock`, `AlertSink`)
//! - `ChainLinker`, which validates drafts and links them onto a chain tail
//!   with a SHA-256 sequence hash
//! - `EntrySigner`, the optional HMAC-SHA256 layer over business fields
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_core::{ChainLinker, EntrySigner, SignatureKey};
//!
//! let entry = ChainLinker::new().link(&chain, draft, tail.as_ref(), clock.now())?;
//! signer.seal(&mut entry);
//! store.append(&entry)?;
//! ```

pub mod linker;
pub mod signature;
pub mod traits;

pub use linker::{canonical_timestamp, hash_entry, ChainLinker};
pub use signature::{EntrySigner, SignatureKey, SIGNATURE_VERSION};
pub use traits::{AlertSink, Clock, LedgerStore, ManualClock, SystemClock};

// ── Tests ─────────────────────────────────────────────────────────────────────
