use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::currency::Currency;
use crate::store::lifecycle::Lifecycle;
use crate::store::{Change, EntityStore};

use super::index::KeyIndex;

/// Both currency indices. Updated together inside one notification callback.
struct CurrencyIndices {
    by_id: KeyIndex<i32, Currency>,
    by_code: KeyIndex<String, Currency>,
}

impl CurrencyIndices {
    fn apply(&self, changes: &[Change<Currency>]) {
        self.by_id.apply(changes);
        self.by_code.apply(changes);
    }
}

/// O(1) currency lookups by id and by ISO code. Codes are indexed
/// uppercase whatever casing the stored entity carries.
pub struct CurrencyCache {
    store: Arc<EntityStore>,
    indices: Arc<CurrencyIndices>,
    lifecycle: Lifecycle,
}

impl CurrencyCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            indices: Arc::new(CurrencyIndices {
                by_id: KeyIndex::new("Currency", |c: &Currency| c.id),
                by_code: KeyIndex::new("Currency", |c: &Currency| c.code.to_uppercase()),
            }),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        let indices = Arc::downgrade(&self.indices);
        let subscription = self.store.currencies.subscribe(move |changes| {
            if let Some(indices) = indices.upgrade() {
                indices.apply(changes);
            }
        });
        self.lifecycle.hold([subscription]);

        let current = self.store.currencies.snapshot();
        self.indices.by_id.seed(&current);
        self.indices.by_code.seed(&current);
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.indices.by_id.clear();
            self.indices.by_code.clear();
        }
    }

    pub fn get_currency_by_id_fast(&self, id: i32) -> Result<Currency, CoreError> {
        let found = self
            .indices
            .by_id
            .get_or_repair(&id, || self.store.currencies.find(|c| c.id == id))
            .ok_or_else(|| CoreError::not_found("Currency", id))?;
        // Keep the sibling index in step with the repair
        self.indices.by_code.insert(&found);
        Ok(found)
    }

    pub fn get_currency_by_code_fast(&self, code: &str) -> Result<Currency, CoreError> {
        let key = code.to_uppercase();
        let found = self
            .indices
            .by_code
            .get_or_repair(&key, || {
                self.store
                    .currencies
                    .find(|c| c.code.eq_ignore_ascii_case(&key))
            })
            .ok_or_else(|| CoreError::not_found("Currency", code))?;
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
