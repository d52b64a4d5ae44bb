//! Cooperative cancellation for relationship changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a parent change polls for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Before the write transaction opens. Nothing has been written.
    BeforeWrite,
    /// After the pointer write, before commit. Stopping rolls back.
    BeforeCommit,
    /// After commit, before timeline entries are recorded.
    BeforeAudit,
}

/// Source of cancellation requests polled by the mutator.
pub trait Cancellation {
    /// `true` when the operation should stop at `at`.
    fn should_stop(&self, at: Checkpoint) -> bool;
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. The mutator polls it at every
/// [`Checkpoint`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Cancellation for CancelToken {
    fn should_stop(&self, _: Checkpoint) -> bool {
        self.is_cancelled()
    }
}
