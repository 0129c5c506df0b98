use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// What a single import batch touched. Produced by the importer and
/// handed to the targeted snapshot updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub import_id: Uuid,
    pub broker_account_ids: BTreeSet<i32>,
    pub bank_account_ids: BTreeSet<i32>,
    pub ticker_ids: BTreeSet<i32>,
    /// Earliest movement timestamp written by the batch
    pub oldest_movement: Option<NaiveDateTime>,
    pub total_movements: usize,
}

impl ImportMetadata {
    pub fn new() -> Self {
        Self {
            import_id: Uuid::new_v4(),
            broker_account_ids: BTreeSet::new(),
            bank_account_ids: BTreeSet::new(),
            ticker_ids: BTreeSet::new(),
            oldest_movement: None,
            total_movements: 0,
        }
    }

    /// Record a movement written for a broker account.
    pub fn touch_broker_account(&mut self, account_id: i32, timestamp: NaiveDateTime) {
        self.broker_account_ids.insert(account_id);
        self.record(timestamp);
    }

    /// Record a movement written for a bank account.
    pub fn touch_bank_account(&mut self, account_id: i32, timestamp: NaiveDateTime) {
        self.bank_account_ids.insert(account_id);
        self.record(timestamp);
    }

    pub fn touch_ticker(&mut self, ticker_id: i32) {
        self.ticker_ids.insert(ticker_id);
    }

    /// True when the batch touched no account at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.broker_account_ids.is_empty() && self.bank_account_ids.is_empty()
    }

    fn record(&mut self, timestamp: NaiveDateTime) {
        self.total_movements += 1;
        self.oldest_movement = Some(match self.oldest_movement {
            Some(current) if current <= timestamp => current,
            _ => timestamp,
        });
    }
}

impl Default for ImportMetadata {
    fn default() -> Self {
        Self::new()
    }
}
