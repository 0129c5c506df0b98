use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use log::{debug, error, info};

use crate::cache::LookupCaches;
use crate::errors::CoreError;
use crate::models::account::{Account, AccountKey};
use crate::models::bank::Bank;
use crate::models::broker::Broker;
use crate::models::currency::Currency;
use crate::models::movement::Movement;
use crate::models::settings::ReactiveSettings;
use crate::models::ticker::Ticker;
use crate::persistence::rows::{
    BankAccountMovementRow, BrokerMovementRow, DividendDateRow, DividendRow, OptionTradeRow,
    TradeRow,
};
use crate::persistence::traits::MovementSource;
use crate::store::diff::{apply_diff, DiffStats};
use crate::store::lifecycle::Lifecycle;
use crate::store::EntityStore;

use super::conversion::MovementConverter;
use super::fifo::settle_option_trades;
use super::import_state::ImportState;
use super::reactive::{retrigger, PassGate, PassOutcome, Scheduler};

/// One page of every movement kind of a broker account.
struct BrokerAccountPage {
    movements: Vec<BrokerMovementRow>,
    trades: Vec<TradeRow>,
    dividends: Vec<DividendRow>,
    dividend_dates: Vec<DividendDateRow>,
    dividend_taxes: Vec<DividendRow>,
    option_trades: Vec<OptionTradeRow>,
}

impl BrokerAccountPage {
    fn convert(&self, converter: &MovementConverter<'_>) -> Result<Vec<Movement>, CoreError> {
        let mut all = converter.convert_all(&self.movements, MovementConverter::broker_movement)?;
        all.extend(converter.convert_all(&self.trades, MovementConverter::trade)?);
        all.extend(converter.convert_all(&self.dividends, MovementConverter::dividend)?);
        all.extend(converter.convert_all(&self.dividend_dates, MovementConverter::dividend_date)?);
        all.extend(converter.convert_all(&self.dividend_taxes, MovementConverter::dividend_tax)?);

        let mut options = self
            .option_trades
            .iter()
            .map(|row| converter.option_record(row))
            .collect::<Result<Vec<_>, _>>()?;
        let settled = settle_option_trades(&mut options);
        if !settled.links.is_empty() {
            debug!(
                "Linked {} option contracts, realized {}",
                settled.links.len(),
                settled.realized
            );
        }
        all.extend(options.into_iter().map(Movement::OptionTrade));
        Ok(all)
    }
}

/// Feed order: newest first, ties broken by kind then id (both descending)
/// so the order is stable across passes.
fn newest_first(a: &Movement, b: &Movement) -> Ordering {
    b.timestamp()
        .cmp(&a.timestamp())
        .then_with(|| b.kind().cmp(&a.kind()))
        .then_with(|| b.key().id.cmp(&a.key().id))
}

fn newest_page(mut movements: Vec<Movement>, page_size: usize) -> Vec<Movement> {
    movements.sort_by(newest_first);
    movements.truncate(page_size);
    movements
}

struct Inner {
    store: Arc<EntityStore>,
    caches: Arc<LookupCaches>,
    source: Arc<dyn MovementSource>,
    import_state: Arc<ImportState>,
    page_size: usize,
    gate: Arc<PassGate>,
    scheduler: Scheduler,
    lifecycle: Lifecycle,
}

impl Inner {
    fn trigger(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule(move || async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_reactive().await;
            }
        });
    }

    /// Reactive path: skip when suppressed or busy, log failures.
    async fn run_reactive(&self) {
        if self.import_state.is_import_in_progress() {
            debug!("Movement pass skipped, import in progress");
            return;
        }
        let Some(_guard) = self.gate.try_begin() else {
            debug!("Movement pass already running, trigger dropped");
            return;
        };
        if let Err(e) = self.pass().await {
            error!("Movement aggregation failed: {}", e);
        }
    }

    async fn run_awaited(&self) -> Result<PassOutcome, CoreError> {
        if self.import_state.is_import_in_progress() {
            debug!("Movement refresh skipped, import in progress");
            return Ok(PassOutcome::SuppressedByImport);
        }
        let _guard = self.gate.begin().await;
        self.pass().await?;
        Ok(PassOutcome::Completed)
    }

    async fn pass(&self) -> Result<DiffStats, CoreError> {
        let accounts = self.store.accounts.snapshot();
        let broker_ids: Vec<i32> = accounts
            .iter()
            .filter_map(|a| a.broker_account().map(|b| b.id))
            .collect();
        let bank_ids: Vec<i32> = accounts
            .iter()
            .filter_map(|a| a.bank_account().map(|b| b.id))
            .collect();

        let (broker_pages, bank_pages) = futures::join!(
            join_all(broker_ids.iter().map(|&id| self.fetch_broker_account(id))),
            join_all(bank_ids.iter().map(|&id| self.fetch_bank_account(id))),
        );

        let converter = MovementConverter::new(&self.caches);
        let conversion = |e: CoreError| match e {
            CoreError::NotFound { .. } => CoreError::aggregation("conversion", e.to_string()),
            other => other,
        };

        let mut feed = Vec::new();
        for page in broker_pages {
            let movements = page?.convert(&converter).map_err(conversion)?;
            feed.extend(newest_page(movements, self.page_size));
        }
        for page in bank_pages {
            let movements = converter
                .convert_all(&page?, MovementConverter::bank_account_movement)
                .map_err(conversion)?;
            feed.extend(newest_page(movements, self.page_size));
        }
        feed.sort_by(newest_first);

        let flags = self.broker_flags(&broker_ids).await?;
        let stats = apply_diff(&self.store.movements, feed, Movement::key);
        let changed = self.write_has_movements(&flags);

        info!(
            "Movements refreshed: {} accounts, {} entries (+{} -{} ~{} moved {}), {} flags changed",
            broker_ids.len() + bank_ids.len(),
            self.store.movements.len(),
            stats.added,
            stats.removed,
            stats.replaced,
            stats.moved,
            changed
        );
        Ok(stats)
    }

    async fn fetch_broker_account(&self, id: i32) -> Result<BrokerAccountPage, CoreError> {
        let source = &self.source;
        let limit = self.page_size;
        let (movements, trades, dividends, dividend_dates, dividend_taxes, option_trades) =
            futures::try_join!(
                source.broker_movements(id, 0, limit),
                source.trades(id, 0, limit),
                source.dividends(id, 0, limit),
                source.dividend_dates(id, 0, limit),
                source.dividend_taxes(id, 0, limit),
                source.option_trades(id, 0, limit),
            )?;
        Ok(BrokerAccountPage {
            movements,
            trades,
            dividends,
            dividend_dates,
            dividend_taxes,
            option_trades,
        })
    }

    async fn fetch_bank_account(&self, id: i32) -> Result<Vec<BankAccountMovementRow>, CoreError> {
        self.source.bank_account_movements(id, 0, self.page_size).await
    }

    /// Full-history existence check per broker account.
    async fn broker_flags(&self, broker_ids: &[i32]) -> Result<HashMap<i32, bool>, CoreError> {
        let checks = broker_ids.iter().map(|&id| async move {
            self.source
                .broker_account_has_movements(id)
                .await
                .map(|has| (id, has))
        });
        Ok(try_join_all(checks).await?.into_iter().collect())
    }

    /// Bank accounts are flagged by presence in the feed. Only flags that
    /// actually change are written, in one batch.
    fn write_has_movements(&self, broker_flags: &HashMap<i32, bool>) -> usize {
        let banks_in_feed: HashSet<i32> = self
            .store
            .movements
            .snapshot()
            .iter()
            .filter_map(|m| match m.account_key() {
                AccountKey::Bank(id) => Some(id),
                _ => None,
            })
            .collect();

        self.store.accounts.edit(|editor| {
            let mut changed = 0;
            for index in 0..editor.len() {
                let Some(account) = editor.get(index) else {
                    continue;
                };
                let wanted = match account.key() {
                    AccountKey::Broker(id) => match broker_flags.get(&id) {
                        Some(flag) => *flag,
                        None => continue,
                    },
                    AccountKey::Bank(id) => banks_in_feed.contains(&id),
                    AccountKey::Empty => continue,
                };
                if wanted != account.has_movements {
                    let updated = account.with_has_movements(wanted);
                    editor.replace_at(index, updated);
                    changed += 1;
                }
            }
            changed
        })
    }
}

/// Keeps the Movements feed in step with the persisted movements of every
/// loaded account.
///
/// Any change to Currencies, Tickers, Brokers, Banks or Accounts schedules
/// a pass on the runtime captured by [`initialize`](Self::initialize). A
/// pass fetches one page per movement kind and account, merges the newest
/// `page_size` entries of each account into one time-ordered feed, applies
/// it as a minimal edit and recomputes the `has_movements` flags.
pub struct MovementAggregator {
    inner: Arc<Inner>,
}

impl MovementAggregator {
    pub fn new(
        store: Arc<EntityStore>,
        caches: Arc<LookupCaches>,
        source: Arc<dyn MovementSource>,
        import_state: Arc<ImportState>,
        settings: &ReactiveSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                caches,
                source,
                import_state,
                page_size: settings.page_size,
                gate: PassGate::new("Movement aggregator"),
                scheduler: Scheduler::new("Movement aggregator", settings.movements_debounce()),
                lifecycle: Lifecycle::default(),
            }),
        }
    }

    /// Subscribe to the source collections and schedule a first pass.
    /// Must run inside a tokio runtime. Idempotent.
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
                .currencies
                .subscribe(retrigger::<_, Currency>(inner, Inner::trigger)),
            store
                .tickers
                .subscribe(retrigger::<_, Ticker>(inner, Inner::trigger)),
            store
                .brokers
                .subscribe(retrigger::<_, Broker>(inner, Inner::trigger)),
            store
                .banks
                .subscribe(retrigger::<_, Bank>(inner, Inner::trigger)),
            store
                .accounts
                .subscribe(retrigger::<_, Account>(inner, Inner::trigger)),
        ]);
        info!("Movement aggregator initialized");

        inner.trigger();
        Ok(())
    }

    pub fn dispose(&self) {
        if self.inner.lifecycle.end() {
            self.inner.scheduler.detach();
            info!("Movement aggregator disposed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lifecycle.is_initialized()
    }

    /// True while a pass is running.
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

    /// Wait for any in-flight pass, then run one and report its result.
    pub async fn refresh_async(&self) -> Result<PassOutcome, CoreError> {
        self.inner.run_awaited().await
    }
}

impl std::fmt::Debug for MovementAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementAggregator")
            .field("initialized", &self.is_initialized())
            .field("loading", &self.is_loading())
            .field("page_size", &self.inner.page_size)
            .finish()
    }
}
