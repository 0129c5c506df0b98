use std::sync::Arc;

use log::debug;

use crate::errors::CoreError;
use crate::models::account::{Account, BankAccount};
use crate::models::bank::Bank;
use crate::models::currency::Currency;
use crate::store::lifecycle::Lifecycle;
use crate::store::{Change, EntityStore};

use super::index::KeyIndex;

struct BankAccountIndex {
    store: Arc<EntityStore>,
    by_id: KeyIndex<i32, BankAccount>,
}

impl BankAccountIndex {
    /// Copy of `account` embedding the bank and currency the store holds now.
    fn with_current_parents(&self, account: &BankAccount) -> BankAccount {
        let bank = self.store.banks.find(|b| b.id == account.bank.id);
        let currency = self.store.currencies.find(|c| c.id == account.currency.id);
        BankAccount {
            bank: bank.unwrap_or_else(|| account.bank.clone()),
            currency: currency.unwrap_or_else(|| account.currency.clone()),
            ..account.clone()
        }
    }

    fn apply_accounts(&self, changes: &[Change<Account>]) {
        for change in changes {
            match change {
                Change::Added { item, .. } => {
                    if let Some(account) = item.bank_account() {
                        self.by_id.insert(&self.with_current_parents(account));
                    }
                }
                Change::Replaced { old, new, .. } => {
                    match (old.bank_account(), new.bank_account()) {
                        (Some(old), Some(new)) => {
                            self.by_id.replace(old, &self.with_current_parents(new));
                        }
                        (Some(old), None) => self.by_id.remove(old),
                        (None, Some(new)) => self.by_id.insert(&self.with_current_parents(new)),
                        (None, None) => {}
                    }
                }
                Change::Removed { item, .. } => {
                    if let Some(account) = item.bank_account() {
                        self.by_id.remove(account);
                    }
                }
                Change::Cleared { .. } => self.by_id.clear(),
            }
        }
    }

    fn apply_banks(&self, changes: &[Change<Bank>]) {
        for change in changes {
            let bank = match change {
                Change::Added { item, .. } => item,
                Change::Replaced { new, .. } => new,
                _ => continue,
            };
            let changed = self.by_id.rewrite(|account| {
                (account.bank.id == bank.id && account.bank != *bank).then(|| BankAccount {
                    bank: bank.clone(),
                    ..account.clone()
                })
            });
            if changed > 0 {
                debug!("Refreshed bank {} in {} cached bank accounts", bank.id, changed);
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
            self.by_id.rewrite(|account| {
                (account.currency.id == currency.id && account.currency != *currency).then(|| {
                    BankAccount {
                        currency: currency.clone(),
                        ..account.clone()
                    }
                })
            });
        }
    }
}

/// O(1) bank-account lookups by id. Follows Banks and Currencies to keep
/// the embedded copies fresh.
pub struct BankAccountCache {
    store: Arc<EntityStore>,
    index: Arc<BankAccountIndex>,
    lifecycle: Lifecycle,
}

impl BankAccountCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        let index = Arc::new(BankAccountIndex {
            store: Arc::clone(&store),
            by_id: KeyIndex::new("BankAccount", |a: &BankAccount| a.id),
        });
        Self {
            store,
            index,
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }

        let index = Arc::downgrade(&self.index);
        let accounts = self.store.accounts.subscribe(move |changes| {
            if let Some(index) = index.upgrade() {
                index.apply_accounts(changes);
            }
        });
        let index = Arc::downgrade(&self.index);
        let banks = self.store.banks.subscribe(move |changes| {
            if let Some(index) = index.upgrade() {
                index.apply_banks(changes);
            }
        });
        let index = Arc::downgrade(&self.index);
        let currencies = self.store.currencies.subscribe(move |changes| {
            if let Some(index) = index.upgrade() {
                index.apply_currencies(changes);
            }
        });
        self.lifecycle.hold([accounts, banks, currencies]);

        let current: Vec<BankAccount> = self
            .store
            .accounts
            .snapshot()
            .iter()
            .filter_map(|a| a.bank_account())
            .map(|a| self.index.with_current_parents(a))
            .collect();
        self.index.by_id.seed(&current);
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.index.by_id.clear();
        }
    }

    pub fn get_bank_account_fast(&self, id: i32) -> Result<BankAccount, CoreError> {
        self.index
            .by_id
            .get_or_repair(&id, || {
                self.store
                    .accounts
                    .find_map(|a| a.bank_account().filter(|b| b.id == id).cloned())
                    .map(|a| self.index.with_current_parents(&a))
            })
            .ok_or_else(|| CoreError::not_found("BankAccount", id))
    }

    pub fn len(&self) -> usize {
        self.index.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
