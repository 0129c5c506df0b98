//! Indexed lookup caches over the entity store.

pub mod bank_account_cache;
pub mod bank_cache;
pub mod broker_account_cache;
pub mod broker_cache;
pub mod currency_cache;
pub(crate) mod index;
pub mod ticker_cache;

use std::sync::Arc;

use crate::store::EntityStore;

pub use bank_account_cache::BankAccountCache;
pub use bank_cache::BankCache;
pub use broker_account_cache::BrokerAccountCache;
pub use broker_cache::BrokerCache;
pub use currency_cache::CurrencyCache;
pub use ticker_cache::TickerCache;

/// Every lookup cache, built over one shared [`EntityStore`].
pub struct LookupCaches {
    pub brokers: BrokerCache,
    pub banks: BankCache,
    pub currencies: CurrencyCache,
    pub tickers: TickerCache,
    pub broker_accounts: BrokerAccountCache,
    pub bank_accounts: BankAccountCache,
}

impl LookupCaches {
    pub fn new(store: &Arc<EntityStore>) -> Self {
        Self {
            brokers: BrokerCache::new(Arc::clone(store)),
            banks: BankCache::new(Arc::clone(store)),
            currencies: CurrencyCache::new(Arc::clone(store)),
            tickers: TickerCache::new(Arc::clone(store)),
            broker_accounts: BrokerAccountCache::new(Arc::clone(store)),
            bank_accounts: BankAccountCache::new(Arc::clone(store)),
        }
    }

    /// Initialize every cache. Idempotent.
    pub fn initialize(&self) {
        self.brokers.initialize();
        self.banks.initialize();
        self.currencies.initialize();
        self.tickers.initialize();
        self.broker_accounts.initialize();
        self.bank_accounts.initialize();
    }

    pub fn dispose(&self) {
        self.brokers.dispose();
        self.banks.dispose();
        self.currencies.dispose();
        self.tickers.dispose();
        self.broker_accounts.dispose();
        self.bank_accounts.dispose();
    }
}

impl std::fmt::Debug for LookupCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCaches")
            .field("brokers", &self.brokers.len())
            .field("banks", &self.banks.len())
            .field("currencies", &self.currencies.len())
            .field("tickers", &self.tickers.len())
            .field("broker_accounts", &self.broker_accounts.len())
            .field("bank_accounts", &self.bank_accounts.len())
            .finish()
    }
}
