use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{BankAccount, BrokerAccount};
use super::bank::Bank;
use super::broker::Broker;
use super::currency::Currency;
use super::ticker::Ticker;

/// Per-ticker position inside a broker-side financial snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticker: Ticker,
    pub total_shares: Decimal,
    pub latest_price: Decimal,
    pub cost_basis: Decimal,
    /// latest_price × total_shares
    pub market_value: Decimal,
    pub unrealized: Decimal,
    pub realized: Decimal,
    /// Share of the snapshot's total market value, in percent
    pub weight: Decimal,
}

/// Financial metrics of a broker or broker account at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub date: NaiveDate,
    pub currency: Currency,
    pub movement_counter: i32,
    pub deposited: Decimal,
    pub withdrawn: Decimal,
    pub invested: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub dividends_received: Decimal,
    pub options_income: Decimal,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub realized_gains: Decimal,
    pub unrealized_gains: Decimal,
    /// (unrealized + realized) / cost_basis × 100
    pub performance: Decimal,
    /// Any stock position or non-flat option group
    pub open_trades: bool,
    pub positions: Vec<PositionSnapshot>,
}

/// Financial metrics of a bank or bank account at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankFinancialSnapshot {
    pub date: NaiveDate,
    pub currency: Currency,
    pub movement_counter: i32,
    pub balance: Decimal,
    pub interest_earned: Decimal,
    pub fees_paid: Decimal,
}

/// Portfolio-wide figures aggregated from every broker snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentOverviewSnapshot {
    pub date: NaiveDate,
    pub portfolios: usize,
    pub invested: Decimal,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub realized_gains: Decimal,
    pub unrealized_gains: Decimal,
    pub performance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub broker: Broker,
    /// Number of accounts held at this broker
    pub portfolios_number: usize,
    pub financial: FinancialSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSnapshot {
    pub bank: Bank,
    pub financial: BankFinancialSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccountSnapshot {
    pub broker_account: BrokerAccount,
    pub financial: FinancialSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountSnapshot {
    pub bank_account: BankAccount,
    pub financial: BankFinancialSnapshot,
}

/// Which loader owns a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    Empty,
    InvestmentOverview,
    Broker,
    Bank,
    BrokerAccount,
    BankAccount,
}

/// Identity of a snapshot inside the Snapshots collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKey {
    Empty,
    InvestmentOverview,
    Broker(i32),
    Bank(i32),
    BrokerAccount(i32),
    BankAccount(i32),
}

/// Entry of the Snapshots collection. Exactly one payload per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverviewSnapshot {
    /// Placeholder present only while no real snapshot exists
    Empty,
    InvestmentOverview(InvestmentOverviewSnapshot),
    Broker(BrokerSnapshot),
    Bank(BankSnapshot),
    BrokerAccount(BrokerAccountSnapshot),
    BankAccount(BankAccountSnapshot),
}

impl OverviewSnapshot {
    #[must_use]
    pub fn kind(&self) -> SnapshotKind {
        match self {
            OverviewSnapshot::Empty => SnapshotKind::Empty,
            OverviewSnapshot::InvestmentOverview(_) => SnapshotKind::InvestmentOverview,
            OverviewSnapshot::Broker(_) => SnapshotKind::Broker,
            OverviewSnapshot::Bank(_) => SnapshotKind::Bank,
            OverviewSnapshot::BrokerAccount(_) => SnapshotKind::BrokerAccount,
            OverviewSnapshot::BankAccount(_) => SnapshotKind::BankAccount,
        }
    }

    #[must_use]
    pub fn key(&self) -> SnapshotKey {
        match self {
            OverviewSnapshot::Empty => SnapshotKey::Empty,
            OverviewSnapshot::InvestmentOverview(_) => SnapshotKey::InvestmentOverview,
            OverviewSnapshot::Broker(s) => SnapshotKey::Broker(s.broker.id),
            OverviewSnapshot::Bank(s) => SnapshotKey::Bank(s.bank.id),
            OverviewSnapshot::BrokerAccount(s) => SnapshotKey::BrokerAccount(s.broker_account.id),
            OverviewSnapshot::BankAccount(s) => SnapshotKey::BankAccount(s.bank_account.id),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, OverviewSnapshot::Empty)
    }
}
