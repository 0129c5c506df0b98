use std::sync::Arc;

use log::{debug, error, info};

use crate::errors::CoreError;
use crate::models::account::Account;
use crate::models::bank::Bank;
use crate::models::broker::Broker;
use crate::models::currency::Currency;
use crate::models::movement::Movement;
use crate::models::settings::ReactiveSettings;
use crate::models::snapshot::OverviewSnapshot;
use crate::store::lifecycle::Lifecycle;
use crate::store::EntityStore;

use super::import_state::ImportState;
use super::reactive::{retrigger, PassGate, PassOutcome, Scheduler};
use super::snapshot_loaders::{LoadScope, SnapshotLoader};
use super::targeted_snapshot_updater::TargetedSnapshotUpdater;

/// Keep exactly one of: a single Empty placeholder, or only real snapshots.
///
/// Returns true when the collection was edited.
pub fn enforce_empty_invariant(store: &EntityStore) -> bool {
    store.snapshots.edit(|editor| {
        let has_real = editor.items().iter().any(|s| !s.is_empty());
        if has_real {
            return editor.remove_where(OverviewSnapshot::is_empty) > 0;
        }
        if editor.is_empty() {
            editor.push(OverviewSnapshot::Empty);
            return true;
        }
        let mut changed = false;
        while editor.len() > 1 {
            editor.remove_at(editor.len() - 1);
            changed = true;
        }
        changed
    })
}

/// Run every loader in order, then enforce the Empty invariant.
///
/// A failing loader does not stop the others; the first error is returned
/// once the invariant holds again.
pub(crate) async fn run_loaders(
    store: &EntityStore,
    loaders: &[Arc<dyn SnapshotLoader>],
    scope: &LoadScope,
) -> Result<usize, CoreError> {
    let mut published = 0;
    let mut first_error = None;
    for loader in loaders {
        match loader.load(scope).await {
            Ok(count) => published += count,
            Err(e) => {
                error!("{} snapshot loader failed: {}", loader.name(), e);
                if first_error.is_none() {
                    first_error = Some(CoreError::aggregation(
                        format!("{} snapshots", loader.name()),
                        e.to_string(),
                    ));
                }
            }
        }
    }
    enforce_empty_invariant(store);
    match first_error {
        Some(e) => Err(e),
        None => Ok(published),
    }
}

pub(crate) struct SnapshotInner {
    pub(crate) store: Arc<EntityStore>,
    pub(crate) loaders: Vec<Arc<dyn SnapshotLoader>>,
    pub(crate) import_state: Arc<ImportState>,
    pub(crate) gate: Arc<PassGate>,
    scheduler: Scheduler,
    lifecycle: Lifecycle,
}

impl SnapshotInner {
    fn trigger(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_reactive().await;
            }
        });
    }

    async fn run_reactive(&self) {
        if self.import_state.is_import_in_progress() {
            debug!("Snapshot pass skipped, import in progress");
            return;
        }
        let Some(_guard) = self.gate.try_begin() else {
            debug!("Snapshot pass already running, trigger dropped");
            return;
        };
        match run_loaders(&self.store, &self.loaders, &LoadScope::Full).await {
            Ok(published) => debug!("Snapshots refreshed: {} published", published),
            Err(e) => error!("Snapshot aggregation failed: {}", e),
        }
    }

    async fn run_awaited(&self) -> Result<PassOutcome, CoreError> {
        if self.import_state.is_import_in_progress() {
            debug!("Snapshot refresh skipped, import in progress");
            return Ok(PassOutcome::SuppressedByImport);
        }
        let _guard = self.gate.begin().await;
        let published = run_loaders(&self.store, &self.loaders, &LoadScope::Full).await?;
        info!("Snapshots refreshed: {} published", published);
        Ok(PassOutcome::Completed)
    }
}

/// Recomputes every overview snapshot whenever movements or the catalog
/// change, and keeps the Empty placeholder mutually exclusive with real
/// snapshots.
pub struct SnapshotAggregator {
    inner: Arc<SnapshotInner>,
}

impl SnapshotAggregator {
    pub fn new(
        store: Arc<EntityStore>,
        loaders: Vec<Arc<dyn SnapshotLoader>>,
        import_state: Arc<ImportState>,
        settings: &ReactiveSettings,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                store,
                loaders,
                import_state,
                gate: PassGate::new("Snapshot aggregator"),
                scheduler: Scheduler::new("Snapshot aggregator", settings.snapshots_debounce()),
                lifecycle: Lifecycle::default(),
            }),
        }
    }

    /// Subscribe to Movements and the catalog collections and schedule a
    /// first pass. Must run inside a tokio runtime. Idempotent.
    pub fn initialize(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        if inner.lifecycle.is_initialized() {
            return Ok(());
        }
        inner.scheduler.attach()?;
        if !inner.lifecycle.begin() {
            return Ok(());
        }

        let store = &inner.store;
        inner.lifecycle.hold([
            store
                .movements
                .subscribe(retrigger::<_, Movement>(inner, SnapshotInner::trigger)),
            store
                .currencies
                .subscribe(retrigger::<_, Currency>(inner, SnapshotInner::trigger)),
            store
                .brokers
                .subscribe(retrigger::<_, Broker>(inner, SnapshotInner::trigger)),
            store
                .banks
                .subscribe(retrigger::<_, Bank>(inner, SnapshotInner::trigger)),
            store
                .accounts
                .subscribe(retrigger::<_, Account>(inner, SnapshotInner::trigger)),
        ]);
        info!(
            "Snapshot aggregator initialized with {} loaders",
            inner.loaders.len()
        );

        inner.trigger();
        Ok(())
    }

    pub fn dispose(&self) {
        if self.inner.lifecycle.end() {
            self.inner.scheduler.detach();
            info!("Snapshot aggregator disposed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lifecycle.is_initialized()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.gate.is_running()
    }

    /// Fire-and-forget pass. Ignored before `initialize()`.
    pub fn refresh(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.spawn(move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_reactive().await;
            }
        });
    }

    pub async fn refresh_async(&self) -> Result<PassOutcome, CoreError> {
        self.inner.run_awaited().await
    }

    /// Updater sharing this aggregator's loaders and reentrancy gate.
    pub fn targeted_updater(&self) -> TargetedSnapshotUpdater {
        TargetedSnapshotUpdater::new(Arc::clone(&self.inner))
    }
}

impl std::fmt::Debug for SnapshotAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotAggregator")
            .field("initialized", &self.is_initialized())
            .field("loading", &self.is_loading())
            .field("loaders", &self.inner.loaders.len())
            .finish()
    }
}
