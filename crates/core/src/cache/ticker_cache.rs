use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::ticker::Ticker;
use crate::store::lifecycle::Lifecycle;
use crate::store::{Change, EntityStore};

use super::index::KeyIndex;

struct TickerIndices {
    by_id: KeyIndex<i32, Ticker>,
    by_symbol: KeyIndex<String, Ticker>,
}

impl TickerIndices {
    fn apply(&self, changes: &[Change<Ticker>]) {
        self.by_id.apply(changes);
        self.by_symbol.apply(changes);
    }
}

/// O(1) ticker lookups by id and by symbol. The Tickers collection grows
/// during imports, so misses followed by a repair are expected here.
pub struct TickerCache {
    store: Arc<EntityStore>,
    indices: Arc<TickerIndices>,
    lifecycle: Lifecycle,
}

impl TickerCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            indices: Arc::new(TickerIndices {
                by_id: KeyIndex::new("Ticker", |t: &Ticker| t.id),
                by_symbol: KeyIndex::new("Ticker", |t: &Ticker| t.symbol.to_uppercase()),
            }),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        let indices = Arc::downgrade(&self.indices);
        let subscription = self.store.tickers.subscribe(move |changes| {
            if let Some(indices) = indices.upgrade() {
                indices.apply(changes);
            }
        });
        self.lifecycle.hold([subscription]);

        let current = self.store.tickers.snapshot();
        self.indices.by_id.seed(&current);
        self.indices.by_symbol.seed(&current);
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.indices.by_id.clear();
            self.indices.by_symbol.clear();
        }
    }

    pub fn get_ticker_by_id_fast(&self, id: i32) -> Result<Ticker, CoreError> {
        let found = self
            .indices
            .by_id
            .get_or_repair(&id, || self.store.tickers.find(|t| t.id == id))
            .ok_or_else(|| CoreError::not_found("Ticker", id))?;
        self.indices.by_symbol.insert(&found);
        Ok(found)
    }

    pub fn get_ticker_by_symbol_fast(&self, symbol: &str) -> Result<Ticker, CoreError> {
        let key = symbol.to_uppercase();
        let found = self
            .indices
            .by_symbol
            .get_or_repair(&key, || {
                self.store
                    .tickers
                    .find(|t| t.symbol.eq_ignore_ascii_case(&key))
            })
            .ok_or_else(|| CoreError::not_found("Ticker", symbol))?;
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
