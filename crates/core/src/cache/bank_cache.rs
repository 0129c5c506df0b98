use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::bank::Bank;
use crate::store::lifecycle::Lifecycle;
use crate::store::EntityStore;

use super::index::KeyIndex;

/// O(1) bank lookups by id over the Banks collection.
pub struct BankCache {
    store: Arc<EntityStore>,
    by_id: Arc<KeyIndex<i32, Bank>>,
    lifecycle: Lifecycle,
}

impl BankCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            by_id: Arc::new(KeyIndex::new("Bank", |b: &Bank| b.id)),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        let index = Arc::downgrade(&self.by_id);
        let subscription = self.store.banks.subscribe(move |changes| {
            if let Some(index) = index.upgrade() {
                index.apply(changes);
            }
        });
        self.lifecycle.hold([subscription]);
        self.by_id.seed(&self.store.banks.snapshot());
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.by_id.clear();
        }
    }

    pub fn get_bank_fast(&self, id: i32) -> Result<Bank, CoreError> {
        self.by_id
            .get_or_repair(&id, || self.store.banks.find(|b| b.id == id))
            .ok_or_else(|| CoreError::not_found("Bank", id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
