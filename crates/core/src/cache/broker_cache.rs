use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::broker::Broker;
use crate::store::lifecycle::Lifecycle;
use crate::store::EntityStore;

use super::index::KeyIndex;

/// O(1) broker lookups by id over the Brokers collection.
pub struct BrokerCache {
    store: Arc<EntityStore>,
    by_id: Arc<KeyIndex<i32, Broker>>,
    lifecycle: Lifecycle,
}

impl BrokerCache {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            by_id: Arc::new(KeyIndex::new("Broker", |b: &Broker| b.id)),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Subscribe to the Brokers collection and seed the index. Idempotent.
    pub fn initialize(&self) {
        if !self.lifecycle.begin() {
            return;
        }
        let index = Arc::downgrade(&self.by_id);
        let subscription = self.store.brokers.subscribe(move |changes| {
            if let Some(index) = index.upgrade() {
                index.apply(changes);
            }
        });
        self.lifecycle.hold([subscription]);
        self.by_id.seed(&self.store.brokers.snapshot());
    }

    pub fn dispose(&self) {
        if self.lifecycle.end() {
            self.by_id.clear();
        }
    }

    pub fn get_broker_fast(&self, id: i32) -> Result<Broker, CoreError> {
        self.by_id
            .get_or_repair(&id, || self.store.brokers.find(|b| b.id == id))
            .ok_or_else(|| CoreError::not_found("Broker", id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
