use crate::models::account::{Account, AccountKey};
use crate::models::bank::Bank;
use crate::models::broker::Broker;
use crate::models::currency::Currency;
use crate::models::movement::Movement;
use crate::models::snapshot::OverviewSnapshot;
use crate::models::ticker::Ticker;

use super::collection::ObservableCollection;

/// The in-memory source of truth: one observable collection per entity kind.
///
/// Owned explicitly (usually behind an `Arc`) instead of living in globals,
/// so every test can start from a fresh store.
#[derive(Debug)]
pub struct EntityStore {
    pub brokers: ObservableCollection<Broker>,
    pub banks: ObservableCollection<Bank>,
    pub currencies: ObservableCollection<Currency>,
    pub tickers: ObservableCollection<Ticker>,
    pub accounts: ObservableCollection<Account>,
    /// Derived feed, written only by the movement aggregator
    pub movements: ObservableCollection<Movement>,
    /// Derived snapshots, written by the snapshot loaders and aggregator
    pub snapshots: ObservableCollection<OverviewSnapshot>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            brokers: ObservableCollection::new("Brokers"),
            banks: ObservableCollection::new("Banks"),
            currencies: ObservableCollection::new("Currencies"),
            tickers: ObservableCollection::new("Tickers"),
            accounts: ObservableCollection::new("Accounts"),
            movements: ObservableCollection::new("Movements"),
            snapshots: ObservableCollection::new("Snapshots"),
        }
    }

    // ── Catalog loading ─────────────────────────────────────────────

    /// Replace the broker catalog wholesale (startup / reconnect).
    pub fn load_brokers(&self, brokers: Vec<Broker>) {
        self.brokers.reset(brokers);
    }

    pub fn load_banks(&self, banks: Vec<Bank>) {
        self.banks.reset(banks);
    }

    pub fn load_currencies(&self, currencies: Vec<Currency>) {
        self.currencies.reset(currencies);
    }

    pub fn load_tickers(&self, tickers: Vec<Ticker>) {
        self.tickers.reset(tickers);
    }

    pub fn load_accounts(&self, accounts: Vec<Account>) {
        self.accounts.reset(accounts);
    }

    // ── In-place edits ──────────────────────────────────────────────

    /// Replace the broker with the same id, or append it.
    pub fn upsert_broker(&self, broker: Broker) {
        let id = broker.id;
        self.brokers.upsert_where(|b| b.id == id, broker);
    }

    pub fn upsert_bank(&self, bank: Bank) {
        let id = bank.id;
        self.banks.upsert_where(|b| b.id == id, bank);
    }

    pub fn upsert_currency(&self, currency: Currency) {
        let id = currency.id;
        self.currencies.upsert_where(|c| c.id == id, currency);
    }

    pub fn upsert_ticker(&self, ticker: Ticker) {
        let id = ticker.id;
        self.tickers.upsert_where(|t| t.id == id, ticker);
    }

    /// Replace the account with the same key, or append it. The current
    /// `has_movements` flag is kept when replacing.
    pub fn upsert_account(&self, account: Account) {
        let key = account.key();
        self.accounts.edit(|editor| {
            match editor.position(|a| a.key() == key) {
                Some(index) => {
                    let has_movements = editor
                        .get(index)
                        .is_some_and(|current| current.has_movements);
                    editor.replace_at(index, account.with_has_movements(has_movements));
                }
                None => editor.push(account),
            }
        });
    }

    pub fn remove_account(&self, key: AccountKey) -> bool {
        self.accounts.remove_where(|a| a.key() == key) > 0
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
