//! Per-type snapshot loaders.
//!
//! Each loader reads the latest persisted snapshot rows of one entity kind,
//! derives the computed figures (unrealized gains, performance, weights,
//! open trades) and publishes the result into the Snapshots collection.
//! A loader only ever touches entries of its own [`SnapshotKind`].

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use rust_decimal::Decimal;

use crate::cache::LookupCaches;
use crate::errors::CoreError;
use crate::models::import::ImportMetadata;
use crate::models::snapshot::{
    BankAccountSnapshot, BankFinancialSnapshot, BankSnapshot, BrokerAccountSnapshot,
    BrokerSnapshot, FinancialSnapshot, InvestmentOverviewSnapshot, OverviewSnapshot,
    PositionSnapshot, SnapshotKey, SnapshotKind,
};
use crate::persistence::rows::{BankSnapshotRow, FinancialSnapshotRow};
use crate::persistence::traits::SnapshotSource;
use crate::store::{Editor, EntityStore};

use super::calculations::{performance, portfolio_weights, unrealized};
use super::fifo::{has_open_positions, OptionGroupKey};

/// Which entities a load covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadScope {
    /// Every loaded entity; entries with no remaining source are pruned
    Full,
    /// Only the given accounts and their parent broker or bank
    Accounts {
        broker_account_ids: BTreeSet<i32>,
        bank_account_ids: BTreeSet<i32>,
    },
}

impl LoadScope {
    #[must_use]
    pub fn from_import(metadata: &ImportMetadata) -> Self {
        LoadScope::Accounts {
            broker_account_ids: metadata.broker_account_ids.clone(),
            bank_account_ids: metadata.bank_account_ids.clone(),
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, LoadScope::Full)
    }
}

/// Loads and publishes one kind of snapshot.
#[async_trait]
pub trait SnapshotLoader: Send + Sync {
    /// Loader name used in logs.
    fn name(&self) -> &str;

    fn kind(&self) -> SnapshotKind;

    /// Publish fresh snapshots for `scope`. Returns how many were published.
    async fn load(&self, scope: &LoadScope) -> Result<usize, CoreError>;
}

/// Store, caches and source shared by the default loaders.
#[derive(Clone)]
pub struct LoaderContext {
    pub store: Arc<EntityStore>,
    pub caches: Arc<LookupCaches>,
    pub source: Arc<dyn SnapshotSource>,
}

impl LoaderContext {
    pub fn new(
        store: Arc<EntityStore>,
        caches: Arc<LookupCaches>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        Self {
            store,
            caches,
            source,
        }
    }

    fn broker_account_ids(&self) -> Vec<i32> {
        self.store
            .accounts
            .snapshot()
            .iter()
            .filter_map(|a| a.broker_account().map(|b| b.id))
            .collect()
    }

    fn bank_account_ids(&self) -> Vec<i32> {
        self.store
            .accounts
            .snapshot()
            .iter()
            .filter_map(|a| a.bank_account().map(|b| b.id))
            .collect()
    }

    // ── Row → snapshot ──────────────────────────────────────────────

    fn financial(&self, row: &FinancialSnapshotRow) -> Result<FinancialSnapshot, CoreError> {
        let market_values: Vec<Decimal> = row
            .positions
            .iter()
            .map(|p| p.latest_price * p.total_shares)
            .collect();
        let weights = portfolio_weights(&market_values);

        let mut positions = Vec::with_capacity(row.positions.len());
        for ((position, market_value), weight) in
            row.positions.iter().zip(market_values).zip(weights)
        {
            positions.push(PositionSnapshot {
                ticker: self.caches.tickers.get_ticker_by_id_fast(position.ticker_id)?,
                total_shares: position.total_shares,
                latest_price: position.latest_price,
                cost_basis: position.cost_basis,
                market_value,
                unrealized: unrealized(
                    position.total_shares,
                    position.latest_price,
                    position.cost_basis,
                ),
                realized: position.realized,
                weight,
            });
        }

        let cost_basis: Decimal = positions.iter().map(|p| p.cost_basis).sum();
        let market_value: Decimal = positions.iter().map(|p| p.market_value).sum();
        let unrealized_gains: Decimal = positions.iter().map(|p| p.unrealized).sum();
        let realized_gains =
            row.realized_gains + positions.iter().map(|p| p.realized).sum::<Decimal>();
        let held_shares: Decimal = positions
            .iter()
            .map(|p| p.total_shares)
            .filter(|shares| *shares > Decimal::ZERO)
            .sum();
        let open_trades = has_open_positions(
            held_shares,
            row.option_legs
                .iter()
                .map(|leg| (OptionGroupKey::from(leg), leg.code)),
        );

        Ok(FinancialSnapshot {
            date: row.date,
            currency: self.caches.currencies.get_currency_by_id_fast(row.currency_id)?,
            movement_counter: row.movement_counter,
            deposited: row.deposited,
            withdrawn: row.withdrawn,
            invested: row.invested,
            commissions: row.commissions,
            fees: row.fees,
            dividends_received: row.dividends_received,
            options_income: row.options_income,
            cost_basis,
            market_value,
            realized_gains,
            unrealized_gains,
            performance: performance(unrealized_gains, realized_gains, cost_basis),
            open_trades,
            positions,
        })
    }

    fn bank_financial(&self, row: &BankSnapshotRow) -> Result<BankFinancialSnapshot, CoreError> {
        Ok(BankFinancialSnapshot {
            date: row.date,
            currency: self.caches.currencies.get_currency_by_id_fast(row.currency_id)?,
            movement_counter: row.movement_counter,
            balance: row.balance,
            interest_earned: row.interest_earned,
            fees_paid: row.fees_paid,
        })
    }
}

// ── Publishing ──────────────────────────────────────────────────────

/// Which existing entries of a kind a publish is responsible for.
enum Coverage {
    All,
    Keys(HashSet<SnapshotKey>),
}

impl Coverage {
    fn covers(&self, key: &SnapshotKey) -> bool {
        match self {
            Coverage::All => true,
            Coverage::Keys(keys) => keys.contains(key),
        }
    }
}

/// Upsert `fresh` by key and drop covered entries of `kind` that were not
/// refreshed. Entries of other kinds are never touched.
fn publish_into(
    editor: &mut Editor<'_, OverviewSnapshot>,
    kind: SnapshotKind,
    coverage: &Coverage,
    fresh: Vec<OverviewSnapshot>,
) -> usize {
    let keep: HashSet<SnapshotKey> = fresh.iter().map(OverviewSnapshot::key).collect();
    editor.remove_where(|s| {
        let key = s.key();
        s.kind() == kind && coverage.covers(&key) && !keep.contains(&key)
    });

    let published = fresh.len();
    for snapshot in fresh {
        let key = snapshot.key();
        match editor.position(|s| s.key() == key) {
            Some(index) => {
                if editor.get(index) != Some(&snapshot) {
                    editor.replace_at(index, snapshot);
                }
            }
            None => editor.push(snapshot),
        }
    }
    published
}

fn publish(
    store: &EntityStore,
    kind: SnapshotKind,
    coverage: &Coverage,
    fresh: Vec<OverviewSnapshot>,
) -> usize {
    store
        .snapshots
        .edit(|editor| publish_into(editor, kind, coverage, fresh))
}

/// Portfolio-wide figures over every broker snapshot in `items`.
fn investment_overview(items: &[OverviewSnapshot]) -> Option<InvestmentOverviewSnapshot> {
    let brokers: Vec<&BrokerSnapshot> = items
        .iter()
        .filter_map(|s| match s {
            OverviewSnapshot::Broker(b) => Some(b),
            _ => None,
        })
        .collect();
    let date = brokers.iter().map(|b| b.financial.date).max()?;

    let sum = |f: fn(&FinancialSnapshot) -> Decimal| -> Decimal {
        brokers.iter().map(|b| f(&b.financial)).sum()
    };
    let cost_basis = sum(|f| f.cost_basis);
    let realized_gains = sum(|f| f.realized_gains);
    let unrealized_gains = sum(|f| f.unrealized_gains);

    Some(InvestmentOverviewSnapshot {
        date,
        portfolios: brokers.iter().map(|b| b.portfolios_number).sum(),
        invested: sum(|f| f.invested),
        cost_basis,
        market_value: sum(|f| f.market_value),
        realized_gains,
        unrealized_gains,
        performance: performance(unrealized_gains, realized_gains, cost_basis),
    })
}

// ── Broker ──────────────────────────────────────────────────────────

/// Broker snapshots, plus the investment overview derived from them.
pub struct BrokerSnapshotLoader {
    ctx: LoaderContext,
}

impl BrokerSnapshotLoader {
    pub fn new(ctx: LoaderContext) -> Self {
        Self { ctx }
    }

    fn broker_ids(&self, scope: &LoadScope) -> BTreeSet<i32> {
        match scope {
            LoadScope::Full => self.ctx.store.brokers.snapshot().iter().map(|b| b.id).collect(),
            LoadScope::Accounts {
                broker_account_ids, ..
            } => broker_account_ids
                .iter()
                .filter_map(|&id| self.ctx.caches.broker_accounts.get_broker_account_fast(id).ok())
                .map(|account| account.broker.id)
                .collect(),
        }
    }
}

#[async_trait]
impl SnapshotLoader for BrokerSnapshotLoader {
    fn name(&self) -> &str {
        "Broker"
    }

    fn kind(&self) -> SnapshotKind {
        SnapshotKind::Broker
    }

    async fn load(&self, scope: &LoadScope) -> Result<usize, CoreError> {
        let ids = self.broker_ids(scope);
        let rows = try_join_all(ids.iter().map(|&id| async move {
            self.ctx.source.broker_snapshot(id).await.map(|row| (id, row))
        }))
        .await?;

        let accounts = self.ctx.store.accounts.snapshot();
        let mut fresh = Vec::new();
        for (id, row) in rows {
            let Some(row) = row else {
                continue;
            };
            let portfolios_number = accounts
                .iter()
                .filter_map(|a| a.broker_account())
                .filter(|a| a.broker.id == id)
                .count();
            fresh.push(OverviewSnapshot::Broker(BrokerSnapshot {
                broker: self.ctx.caches.brokers.get_broker_fast(id)?,
                portfolios_number,
                financial: self.ctx.financial(&row)?,
            }));
        }

        let coverage = match scope {
            LoadScope::Full => Coverage::All,
            LoadScope::Accounts { .. } => {
                Coverage::Keys(ids.iter().map(|&id| SnapshotKey::Broker(id)).collect())
            }
        };
        let published = self.ctx.store.snapshots.edit(|editor| {
            let published = publish_into(editor, SnapshotKind::Broker, &coverage, fresh);
            let overview: Vec<OverviewSnapshot> = investment_overview(editor.items())
                .map(OverviewSnapshot::InvestmentOverview)
                .into_iter()
                .collect();
            publish_into(editor, SnapshotKind::InvestmentOverview, &Coverage::All, overview);
            published
        });
        debug!("Broker loader published {} snapshots", published);
        Ok(published)
    }
}

// ── Bank ────────────────────────────────────────────────────────────

pub struct BankSnapshotLoader {
    ctx: LoaderContext,
}

impl BankSnapshotLoader {
    pub fn new(ctx: LoaderContext) -> Self {
        Self { ctx }
    }

    fn bank_ids(&self, scope: &LoadScope) -> BTreeSet<i32> {
        match scope {
            LoadScope::Full => self.ctx.store.banks.snapshot().iter().map(|b| b.id).collect(),
            LoadScope::Accounts {
                bank_account_ids, ..
            } => bank_account_ids
                .iter()
                .filter_map(|&id| self.ctx.caches.bank_accounts.get_bank_account_fast(id).ok())
                .map(|account| account.bank.id)
                .collect(),
        }
    }
}

#[async_trait]
impl SnapshotLoader for BankSnapshotLoader {
    fn name(&self) -> &str {
        "Bank"
    }

    fn kind(&self) -> SnapshotKind {
        SnapshotKind::Bank
    }

    async fn load(&self, scope: &LoadScope) -> Result<usize, CoreError> {
        let ids = self.bank_ids(scope);
        let rows = try_join_all(ids.iter().map(|&id| async move {
            self.ctx.source.bank_snapshot(id).await.map(|row| (id, row))
        }))
        .await?;

        let mut fresh = Vec::new();
        for (id, row) in rows {
            if let Some(row) = row {
                fresh.push(OverviewSnapshot::Bank(BankSnapshot {
                    bank: self.ctx.caches.banks.get_bank_fast(id)?,
                    financial: self.ctx.bank_financial(&row)?,
                }));
            }
        }

        let coverage = match scope {
            LoadScope::Full => Coverage::All,
            LoadScope::Accounts { .. } => {
                Coverage::Keys(ids.iter().map(|&id| SnapshotKey::Bank(id)).collect())
            }
        };
        Ok(publish(&self.ctx.store, SnapshotKind::Bank, &coverage, fresh))
    }
}

// ── Broker account ──────────────────────────────────────────────────

pub struct BrokerAccountSnapshotLoader {
    ctx: LoaderContext,
}

impl BrokerAccountSnapshotLoader {
    pub fn new(ctx: LoaderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SnapshotLoader for BrokerAccountSnapshotLoader {
    fn name(&self) -> &str {
        "BrokerAccount"
    }

    fn kind(&self) -> SnapshotKind {
        SnapshotKind::BrokerAccount
    }

    async fn load(&self, scope: &LoadScope) -> Result<usize, CoreError> {
        let ids: BTreeSet<i32> = match scope {
            LoadScope::Full => self.ctx.broker_account_ids().into_iter().collect(),
            LoadScope::Accounts {
                broker_account_ids, ..
            } => broker_account_ids.clone(),
        };
        let rows = try_join_all(ids.iter().map(|&id| async move {
            self.ctx
                .source
                .broker_account_snapshot(id)
                .await
                .map(|row| (id, row))
        }))
        .await?;

        let mut fresh = Vec::new();
        for (id, row) in rows {
            let Some(row) = row else {
                continue;
            };
            // A touched account may have been removed since the import
            let found = self.ctx.caches.broker_accounts.get_broker_account_fast(id);
            let broker_account = match found {
                Ok(account) => account,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            fresh.push(OverviewSnapshot::BrokerAccount(BrokerAccountSnapshot {
                broker_account,
                financial: self.ctx.financial(&row)?,
            }));
        }

        let coverage = match scope {
            LoadScope::Full => Coverage::All,
            LoadScope::Accounts { .. } => {
                Coverage::Keys(ids.iter().map(|&id| SnapshotKey::BrokerAccount(id)).collect())
            }
        };
        Ok(publish(
            &self.ctx.store,
            SnapshotKind::BrokerAccount,
            &coverage,
            fresh,
        ))
    }
}

// ── Bank account ────────────────────────────────────────────────────

pub struct BankAccountSnapshotLoader {
    ctx: LoaderContext,
}

impl BankAccountSnapshotLoader {
    pub fn new(ctx: LoaderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SnapshotLoader for BankAccountSnapshotLoader {
    fn name(&self) -> &str {
        "BankAccount"
    }

    fn kind(&self) -> SnapshotKind {
        SnapshotKind::BankAccount
    }

    async fn load(&self, scope: &LoadScope) -> Result<usize, CoreError> {
        let ids: BTreeSet<i32> = match scope {
            LoadScope::Full => self.ctx.bank_account_ids().into_iter().collect(),
            LoadScope::Accounts {
                bank_account_ids, ..
            } => bank_account_ids.clone(),
        };
        let rows = try_join_all(ids.iter().map(|&id| async move {
            self.ctx
                .source
                .bank_account_snapshot(id)
                .await
                .map(|row| (id, row))
        }))
        .await?;

        let mut fresh = Vec::new();
        for (id, row) in rows {
            let Some(row) = row else {
                continue;
            };
            let found = self.ctx.caches.bank_accounts.get_bank_account_fast(id);
            let bank_account = match found {
                Ok(account) => account,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            fresh.push(OverviewSnapshot::BankAccount(BankAccountSnapshot {
                bank_account,
                financial: self.ctx.bank_financial(&row)?,
            }));
        }

        let coverage = match scope {
            LoadScope::Full => Coverage::All,
            LoadScope::Accounts { .. } => {
                Coverage::Keys(ids.iter().map(|&id| SnapshotKey::BankAccount(id)).collect())
            }
        };
        Ok(publish(
            &self.ctx.store,
            SnapshotKind::BankAccount,
            &coverage,
            fresh,
        ))
    }
}

/// The four default loaders, in the order the aggregator runs them.
pub fn default_loaders(ctx: &LoaderContext) -> Vec<Arc<dyn SnapshotLoader>> {
    vec![
        Arc::new(BrokerSnapshotLoader::new(ctx.clone())),
        Arc::new(BankSnapshotLoader::new(ctx.clone())),
        Arc::new(BrokerAccountSnapshotLoader::new(ctx.clone())),
        Arc::new(BankAccountSnapshotLoader::new(ctx.clone())),
    ]
}
