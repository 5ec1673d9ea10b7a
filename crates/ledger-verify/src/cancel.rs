//! Cooperative cancellation for long verification scans.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared flag a caller can set to abandon a running scan.
///
/// Verification is purely computational, so abandoning it midway leaves
/// nothing behind.  Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
