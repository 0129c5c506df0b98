use std::sync::Arc;

use log::debug;

use crate::errors::CoreError;
use crate::models::account::{Account, BrokerAccount};
use crate::models::broker::Broker;
use crate::models::currency::Currency;
use crate::store::lifecycle::Lifecycle;
use crate::store::{Change, EntityStore};

use super::index::KeyIndex;

struct BrokerAccountIndices {
    store: Arc<EntityStore>,
    by_id: KeyIndex<i32, BrokerAccount>,
    by_number: KeyIndex<String, BrokerAccount>,
}

impl BrokerAccountIndices {
    /// Copy of `account` embedding the broker and currency the store holds
    /// now. The Accounts collection keeps whatever parents it was written
    /// with, which go stale once a parent is edited.
    fn with_current_parents(&self, account: &BrokerAccount) -> BrokerAccount {
        let broker = self.store.brokers.find(|b| b.id == account.broker.id);
        let currency = self.store.currencies.find(|c| c.id == account.currency.id);
        BrokerAccount {
            broker: broker.unwrap_or_else(|| account.broker.clone()),
            currency: currency.unwrap_or_else(|| account.currency.clone()),
            ..account.clone()
        }
    }

    fn insert(&self, account: &BrokerAccount) {
        self.by_id.insert(account);
        self.by_number.insert(account);
    }

    fn remove(&self, account: &BrokerAccount) {
        self.by_id.remove(account);
        self.by_number.remove(account);
    }

    fn clear(&self) {
        self.by_id.clear();
        self.by_number.clear();
    }

    /// Accounts collection changes, projected onto broker accounts.
    fn apply_accounts(&self, changes: &[Change<Account>]) {
        for change in changes {
            match change {
                Change::Added { item, .. } => {
                    if let Some(account) = item.broker_account() {
                        self.insert(&self.with_current_parents(account));
                    }
                }
                Change::Replaced { old, new, .. } => {
                    match (old.broker_account(), new.broker_account()) {
                        (Some(old), Some(new)) => {
                            let new = self.with_current_parents(new);
                            self.by_id.replace(old, &new);
                            self.by_number.replace(old, &new);
                        }
                        (Some(old), None) => self.remove(old),
                        (None, Some(new)) => self.insert(&self.with_current_parents(new)),
                        (None, None) => {}
                    }
                }
                Change::Removed { item, .. } => {
                    if let Some(account) = item.broker_account() {
                        self.remove(account);
                    }
                }
                Change::Cleared { .. } => self.clear(),
            }
        }
    }

    /// Embed the edited broker into every cached account that references it.
    fn apply_brokers(&self, changes: &[Change<Broker>]) {
        for change in changes {
            let broker = match change {
                Change::Added { item, .. } => item,
                Change::Replaced { new, .. } => new,
                _ => continue,
            };
            let rewrite = |account: &BrokerAccount| {
                (account.broker.id == broker.id && account.broker != *broker).then(|| {
                    BrokerAccount {
                        broker: broker.clone(),
                        ..account.clone()
                    }
                })
            };
            let changed = self.by_id.rewrite(rewrite);
            self.by_number.rewrite(rewrite);
            if changed > 0 {
                debug!("Refreshed broker {} in {} cached broker accounts", broker.id, changed);
            }
        }
    }

    fn apply_currencies(&self, changes: &[Change<Currency>]) {
        for change in changes {
            let currency = match change {
                Change::Added { item, .. } => item,
                Change::Replaced { new, .. } => new,
                _ => continue,
            };
            let rewrite = |account: &BrokerAccount| {
                (account.currency.id == currency.id && account.currency != *currency).then(|| {
                    BrokerAccount {
                        currency: currency.clone(),
                        ..account.clone()
                    }
                })
            };
            self.by_id.rewrite(rewrite);
            self.by_number.rewrite(rewrite);
        }
    }
}

/// O(1) broker-account lookups by id and by account number.
///
/// Besides the Accounts collection it follows Brokers and Currencies, so the
/// embedded broker/currency copies stay fresh when a parent is edited.
pub struct BrokerAccountCache {
    store: Arc<EntityStore>,
    indices: Arc<BrokerAccountIndices>,
    lifecycle: Lifecycle,
}

impl BrokerAccountCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        let indices = Arc::new(BrokerAccountIndices {
            store: Arc::clone(&store),
            by_id: KeyIndex::new("BrokerAccount", |a: &BrokerAccount| a.id),
            by_number: KeyIndex::new("BrokerAccount", |a: &BrokerAccount| {
                a.account_number.clone()
            }),
        });
        Self {
            store,
            indices,
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }

        let indices = Arc::downgrade(&self.indices);
        let accounts = self.store.accounts.subscribe(move |changes| {
            if let Some(indices) = indices.upgrade() {
                indices.apply_accounts(changes);
            }
        });
        let indices = Arc::downgrade(&self.indices);
        let brokers = self.store.brokers.subscribe(move |changes| {
            if let Some(indices) = indices.upgrade() {
                indices.apply_brokers(changes);
            }
        });
        let indices = Arc::downgrade(&self.indices);
        let currencies = self.store.currencies.subscribe(move |changes| {
            if let Some(indices) = indices.upgrade() {
                indices.apply_currencies(changes);
            }
        });
        self.lifecycle.hold([accounts, brokers, currencies]);

        let current: Vec<BrokerAccount> = self
            .store
            .accounts
            .snapshot()
            .iter()
            .filter_map(|a| a.broker_account())
            .map(|a| self.indices.with_current_parents(a))
            .collect();
        self.indices.by_id.seed(&current);
        self.indices.by_number.seed(&current);
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.indices.clear();
        }
    }

    pub fn get_broker_account_fast(&self, id: i32) -> Result<BrokerAccount, CoreError> {
        let found = self
            .indices
            .by_id
            .get_or_repair(&id, || {
                self.store
                    .accounts
                    .find_map(|a| a.broker_account().filter(|b| b.id == id).cloned())
                    .map(|a| self.indices.with_current_parents(&a))
            })
            .ok_or_else(|| CoreError::not_found("BrokerAccount", id))?;
        self.indices.by_number.insert(&found);
        Ok(found)
    }

    pub fn get_broker_account_by_number_fast(
        &self,
        account_number: &str,
    ) -> Result<BrokerAccount, CoreError> {
        let key = account_number.to_string();
        let found = self
            .indices
            .by_number
            .get_or_repair(&key, || {
                self.store.accounts.find_map(|a| {
                    a.broker_account()
                        .filter(|b| b.account_number == account_number)
                        .cloned()
                })
                .map(|a| self.indices.with_current_parents(&a))
            })
            .ok_or_else(|| CoreError::not_found("BrokerAccount", account_number))?;
        self.indices.by_id.insert(&found);
        Ok(found)
    }

    pub fn len(&self) -> usize {
        self.indices.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
