use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info};

/// Advisory flag polled by the aggregators: while an import runs, every
/// pass is skipped. Once the import ends the importer refreshes through the
/// targeted snapshot updater.
///
/// Imports may nest; the flag stays raised until the last guard drops.
#[derive(Debug, Default)]
pub struct ImportState {
    in_progress: AtomicUsize,
}

impl ImportState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_import_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire) > 0
    }

    /// Raise the flag until the returned guard is dropped.
    #[must_use = "the import ends as soon as the guard is dropped"]
    pub fn begin_import(self: &Arc<Self>) -> ImportGuard {
        let depth = self.in_progress.fetch_add(1, Ordering::AcqRel) + 1;
        if depth == 1 {
            info!("Import started, reactive passes suspended");
        } else {
            debug!("Nested import started (depth {})", depth);
        }
        ImportGuard {
            state: Arc::clone(self),
        }
    }
}

/// RAII guard returned by [`ImportState::begin_import`].
#[derive(Debug)]
pub struct ImportGuard {
    state: Arc<ImportState>,
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        if self.state.in_progress.fetch_sub(1, Ordering::AcqRel) == 1 {
            info!("Import finished, reactive passes resumed");
        }
    }
}
