use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::collection::Subscription;

/// Initialize-once bookkeeping shared by caches and aggregators: remembers
/// whether `initialize()` ran and owns the subscriptions it created.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    initialized: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Lifecycle {
    /// True exactly once until the next [`end`](Self::end).
    pub(crate) fn begin(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn hold(&self, subscriptions: impl IntoIterator<Item = Subscription>) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(subscriptions);
    }

    /// Drop every held subscription. Returns false if not initialized.
    pub(crate) fn end(&self) -> bool {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return false;
        }
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        drop(subscriptions);
        true
    }
}
