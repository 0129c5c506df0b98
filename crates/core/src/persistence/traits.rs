use async_trait::async_trait;

use crate::errors::CoreError;

use super::rows::{
    BankAccountMovementRow, BankSnapshotRow, BrokerMovementRow, DividendDateRow, DividendRow,
    FinancialSnapshotRow, OptionTradeRow, TradeRow,
};

/// Paged movement reads (Dependency Inversion: the reactive core never
/// talks to SQL directly).
///
/// Every method returns at most `limit` rows starting at `offset`, newest
/// first. Implementations are expected to be cheap to call concurrently.
#[async_trait]
pub trait MovementSource: Send + Sync {
    async fn broker_movements(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BrokerMovementRow>, CoreError>;

    async fn trades(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TradeRow>, CoreError>;

    async fn dividends(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendRow>, CoreError>;

    async fn dividend_dates(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendDateRow>, CoreError>;

    async fn dividend_taxes(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendRow>, CoreError>;

    async fn option_trades(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<OptionTradeRow>, CoreError>;

    async fn bank_account_movements(
        &self,
        bank_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BankAccountMovementRow>, CoreError>;

    /// Existence check over the full history of a broker account (cheaper
    /// than inspecting the truncated in-memory feed).
    async fn broker_account_has_movements(&self, broker_account_id: i32)
        -> Result<bool, CoreError>;
}

/// Reads of the latest persisted snapshot per entity. `Ok(None)` means no
/// snapshot was ever computed for that entity.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn broker_snapshot(&self, broker_id: i32)
        -> Result<Option<FinancialSnapshotRow>, CoreError>;

    async fn broker_account_snapshot(
        &self,
        broker_account_id: i32,
    ) -> Result<Option<FinancialSnapshotRow>, CoreError>;

    async fn bank_snapshot(&self, bank_id: i32) -> Result<Option<BankSnapshotRow>, CoreError>;

    async fn bank_account_snapshot(
        &self,
        bank_account_id: i32,
    ) -> Result<Option<BankSnapshotRow>, CoreError>;
}
