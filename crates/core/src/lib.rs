pub mod cache;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod services;
pub mod store;

use std::sync::Arc;

use cache::LookupCaches;
use errors::CoreError;
use models::account::{BankAccount, BrokerAccount};
use models::bank::Bank;
use models::broker::Broker;
use models::currency::Currency;
use models::import::ImportMetadata;
use models::settings::ReactiveSettings;
use models::ticker::Ticker;
use persistence::traits::{MovementSource, SnapshotSource};
use services::snapshot_loaders::{default_loaders, LoaderContext, SnapshotLoader};
use services::{
    ImportState, MovementAggregator, PassOutcome, SnapshotAggregator, TargetedSnapshotUpdater,
};
use store::EntityStore;

/// Main entry point of the Binnaculum core library.
///
/// Owns the entity store, the lookup caches and both reactive aggregators.
/// Nothing is global: build one per app session (or per test).
#[must_use]
pub struct Binnaculum {
    store: Arc<EntityStore>,
    caches: Arc<LookupCaches>,
    import_state: Arc<ImportState>,
    movements: MovementAggregator,
    snapshots: SnapshotAggregator,
    updater: TargetedSnapshotUpdater,
    settings: ReactiveSettings,
}

impl std::fmt::Debug for Binnaculum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binnaculum")
            .field("accounts", &self.store.accounts.len())
            .field("movements", &self.store.movements.len())
            .field("snapshots", &self.store.snapshots.len())
            .field("caches", &self.caches)
            .field("import_in_progress", &self.import_state.is_import_in_progress())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Binnaculum {
    /// Build a core with the four default snapshot loaders.
    pub fn new(
        movement_source: Arc<dyn MovementSource>,
        snapshot_source: Arc<dyn SnapshotSource>,
        settings: ReactiveSettings,
    ) -> Result<Self, CoreError> {
        Self::with_loaders(movement_source, settings, |store, caches| {
            default_loaders(&LoaderContext::new(
                Arc::clone(store),
                Arc::clone(caches),
                snapshot_source,
            ))
        })
    }

    /// Build a core with custom snapshot loaders, created over the core's
    /// own store and caches.
    pub fn with_loaders<F>(
        movement_source: Arc<dyn MovementSource>,
        settings: ReactiveSettings,
        make_loaders: F,
    ) -> Result<Self, CoreError>
    where
        F: FnOnce(&Arc<EntityStore>, &Arc<LookupCaches>) -> Vec<Arc<dyn SnapshotLoader>>,
    {
        settings.validate()?;

        let store = Arc::new(EntityStore::new());
        let caches = Arc::new(LookupCaches::new(&store));
        let import_state = Arc::new(ImportState::new());

        let movements = MovementAggregator::new(
            Arc::clone(&store),
            Arc::clone(&caches),
            movement_source,
            Arc::clone(&import_state),
            &settings,
        );
        let snapshots = SnapshotAggregator::new(
            Arc::clone(&store),
            make_loaders(&store, &caches),
            Arc::clone(&import_state),
            &settings,
        );
        let updater = snapshots.targeted_updater();

        Ok(Self {
            store,
            caches,
            import_state,
            movements,
            snapshots,
            updater,
            settings,
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Initialize the caches, then both aggregators. Must run inside a
    /// tokio runtime. Idempotent.
    pub fn initialize(&self) -> Result<(), CoreError> {
        self.caches.initialize();
        self.movements.initialize()?;
        self.snapshots.initialize()?;
        Ok(())
    }

    /// Drop every subscription. Collections keep their content.
    pub fn dispose(&self) {
        self.snapshots.dispose();
        self.movements.dispose();
        self.caches.dispose();
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn caches(&self) -> &Arc<LookupCaches> {
        &self.caches
    }

    pub fn import_state(&self) -> &Arc<ImportState> {
        &self.import_state
    }

    pub fn settings(&self) -> &ReactiveSettings {
        &self.settings
    }

    pub fn movement_aggregator(&self) -> &MovementAggregator {
        &self.movements
    }

    pub fn snapshot_aggregator(&self) -> &SnapshotAggregator {
        &self.snapshots
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Schedule a movement and a snapshot pass without waiting.
    pub fn refresh(&self) {
        self.movements.refresh();
        self.snapshots.refresh();
    }

    /// Recompute movements, then snapshots, waiting for both.
    ///
    /// Returns the snapshot outcome; a suppressed movement pass short-circuits.
    pub async fn refresh_async(&self) -> Result<PassOutcome, CoreError> {
        if self.movements.refresh_async().await? == PassOutcome::SuppressedByImport {
            return Ok(PassOutcome::SuppressedByImport);
        }
        self.snapshots.refresh_async().await
    }

    /// Refresh only the snapshots touched by an import batch.
    pub async fn update_snapshots_for_import(
        &self,
        metadata: &ImportMetadata,
    ) -> Result<PassOutcome, CoreError> {
        self.updater.update_for_import(metadata).await
    }

    // ── Lookups ─────────────────────────────────────────────────────

    pub fn broker(&self, id: i32) -> Result<Broker, CoreError> {
        self.caches.brokers.get_broker_fast(id)
    }

    pub fn bank(&self, id: i32) -> Result<Bank, CoreError> {
        self.caches.banks.get_bank_fast(id)
    }

    pub fn currency(&self, id: i32) -> Result<Currency, CoreError> {
        self.caches.currencies.get_currency_by_id_fast(id)
    }

    pub fn currency_by_code(&self, code: &str) -> Result<Currency, CoreError> {
        self.caches.currencies.get_currency_by_code_fast(code)
    }

    pub fn ticker(&self, id: i32) -> Result<Ticker, CoreError> {
        self.caches.tickers.get_ticker_by_id_fast(id)
    }

    pub fn ticker_by_symbol(&self, symbol: &str) -> Result<Ticker, CoreError> {
        self.caches.tickers.get_ticker_by_symbol_fast(symbol)
    }

    pub fn broker_account(&self, id: i32) -> Result<BrokerAccount, CoreError> {
        self.caches.broker_accounts.get_broker_account_fast(id)
    }

    pub fn broker_account_by_number(
        &self,
        account_number: &str,
    ) -> Result<BrokerAccount, CoreError> {
        self.caches
            .broker_accounts
            .get_broker_account_by_number_fast(account_number)
    }

    pub fn bank_account(&self, id: i32) -> Result<BankAccount, CoreError> {
        self.caches.bank_accounts.get_bank_account_fast(id)
    }
}
