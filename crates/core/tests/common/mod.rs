#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use binnaculum_core::errors::CoreError;
use binnaculum_core::models::account::{Account, BankAccount, BrokerAccount};
use binnaculum_core::models::bank::Bank;
use binnaculum_core::models::broker::{Broker, SupportedBroker};
use binnaculum_core::models::currency::Currency;
use binnaculum_core::models::movement::{
    BankAccountMovementType, BrokerMovementType, OptionType, TradeCode, TradeType,
};
use binnaculum_core::models::ticker::Ticker;
use binnaculum_core::persistence::rows::{
    BankAccountMovementRow, BankSnapshotRow, BrokerMovementRow, DividendDateRow, DividendRow,
    FinancialSnapshotRow, OptionLegRow, OptionTradeRow, PositionRow, TradeRow,
};
use binnaculum_core::persistence::traits::{MovementSource, SnapshotSource};
use binnaculum_core::store::EntityStore;

// ═══════════════════════════════════════════════════════════════════
// Catalog fixtures
// ═══════════════════════════════════════════════════════════════════

pub const USD: i32 = 1;
pub const EUR: i32 = 2;
pub const IBKR: i32 = 1;
pub const TASTY: i32 = 2;
pub const REVOLUT: i32 = 1;
pub const AAPL: i32 = 1;
pub const SPY: i32 = 2;
pub const IBKR_ACCOUNT: i32 = 10;
pub const TASTY_ACCOUNT: i32 = 11;
pub const SAVINGS: i32 = 20;

pub fn usd() -> Currency {
    Currency::new(USD, "usd", "$", "US Dollar")
}

pub fn eur() -> Currency {
    Currency::new(EUR, "EUR", "€", "Euro")
}

pub fn ibkr() -> Broker {
    Broker::new(IBKR, "Interactive Brokers", "ibkr", SupportedBroker::IBKR)
}

pub fn tasty() -> Broker {
    Broker::new(TASTY, "Tastytrade", "tastytrade", SupportedBroker::Tastytrade)
}

pub fn revolut() -> Bank {
    Bank::new(REVOLUT, "Revolut")
}

pub fn aapl() -> Ticker {
    Ticker::with_name(AAPL, "aapl", "Apple Inc.")
}

pub fn spy() -> Ticker {
    Ticker::new(SPY, "SPY")
}

pub fn ibkr_account() -> BrokerAccount {
    BrokerAccount {
        id: IBKR_ACCOUNT,
        broker: ibkr(),
        account_number: "U1234567".into(),
        currency: usd(),
    }
}

pub fn tasty_account() -> BrokerAccount {
    BrokerAccount {
        id: TASTY_ACCOUNT,
        broker: tasty(),
        account_number: "5WT00001".into(),
        currency: usd(),
    }
}

pub fn savings_account() -> BankAccount {
    BankAccount {
        id: SAVINGS,
        bank: revolut(),
        name: "Savings".into(),
        description: None,
        currency: eur(),
    }
}

/// Currencies, brokers, banks, tickers and the three accounts.
pub fn load_catalog(store: &EntityStore) {
    store.load_currencies(vec![usd(), eur()]);
    store.load_brokers(vec![ibkr(), tasty()]);
    store.load_banks(vec![revolut()]);
    store.load_tickers(vec![aapl(), spy()]);
    store.load_accounts(vec![
        Account::broker(ibkr_account()),
        Account::broker(tasty_account()),
        Account::bank(savings_account()),
    ]);
}

pub fn seeded_store() -> Arc<EntityStore> {
    let store = Arc::new(EntityStore::new());
    load_catalog(&store);
    store
}

/// 2024-03-`day` at `hour`:00.
pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid fixture timestamp")
}

pub fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).expect("valid fixture date")
}

// ═══════════════════════════════════════════════════════════════════
// Row builders
// ═══════════════════════════════════════════════════════════════════

pub fn deposit(id: i32, account: i32, timestamp: NaiveDateTime, amount: Decimal) -> BrokerMovementRow {
    BrokerMovementRow {
        id,
        timestamp,
        amount,
        currency_id: USD,
        broker_account_id: account,
        commissions: Decimal::ZERO,
        fees: Decimal::ZERO,
        movement_type: BrokerMovementType::Deposit,
        notes: None,
        from_currency_id: None,
        amount_changed: None,
        ticker_id: None,
        quantity: None,
    }
}

pub fn trade(
    id: i32,
    account: i32,
    ticker: i32,
    timestamp: NaiveDateTime,
    quantity: Decimal,
    price: Decimal,
    code: TradeCode,
) -> TradeRow {
    TradeRow {
        id,
        timestamp,
        ticker_id: ticker,
        broker_account_id: account,
        currency_id: USD,
        quantity,
        price,
        commissions: Decimal::ZERO,
        fees: Decimal::ZERO,
        trade_code: code,
        trade_type: TradeType::Long,
        leveraged: Decimal::ONE,
        notes: None,
    }
}

pub fn dividend(id: i32, account: i32, timestamp: NaiveDateTime, amount: Decimal) -> DividendRow {
    DividendRow {
        id,
        timestamp,
        amount,
        ticker_id: AAPL,
        currency_id: USD,
        broker_account_id: account,
    }
}

pub fn option_row(
    id: i32,
    account: i32,
    timestamp: NaiveDateTime,
    code: TradeCode,
    net_premium: Decimal,
) -> OptionTradeRow {
    OptionTradeRow {
        id,
        timestamp,
        expiration_date: at(29, 0),
        premium: net_premium.abs(),
        net_premium,
        ticker_id: SPY,
        broker_account_id: account,
        currency_id: USD,
        option_type: OptionType::Put,
        code,
        strike: Decimal::from(500),
        commissions: Decimal::ZERO,
        fees: Decimal::ZERO,
        is_open: code.is_opening(),
        closed_with: None,
        multiplier: Decimal::from(100),
        quantity: 1,
        notes: None,
    }
}

pub fn bank_movement(
    id: i32,
    account: i32,
    timestamp: NaiveDateTime,
    amount: Decimal,
) -> BankAccountMovementRow {
    BankAccountMovementRow {
        id,
        timestamp,
        amount,
        bank_account_id: account,
        currency_id: EUR,
        movement_type: BankAccountMovementType::Balance,
    }
}

pub fn position(
    ticker: i32,
    total_shares: Decimal,
    latest_price: Decimal,
    cost_basis: Decimal,
    realized: Decimal,
) -> PositionRow {
    PositionRow {
        ticker_id: ticker,
        total_shares,
        latest_price,
        cost_basis,
        realized,
    }
}

pub fn option_leg(account: i32, code: TradeCode) -> OptionLegRow {
    OptionLegRow {
        ticker_id: SPY,
        currency_id: USD,
        broker_account_id: account,
        option_type: OptionType::Put,
        strike: Decimal::from(500),
        expiration_date: at(29, 0),
        code,
    }
}

pub fn financial_row(
    invested: Decimal,
    positions: Vec<PositionRow>,
    option_legs: Vec<OptionLegRow>,
) -> FinancialSnapshotRow {
    FinancialSnapshotRow {
        date: day(15),
        currency_id: USD,
        movement_counter: positions.len() as i32,
        deposited: invested,
        withdrawn: Decimal::ZERO,
        invested,
        commissions: Decimal::ZERO,
        fees: Decimal::ZERO,
        dividends_received: Decimal::ZERO,
        options_income: Decimal::ZERO,
        realized_gains: Decimal::ZERO,
        positions,
        option_legs,
    }
}

pub fn bank_row(balance: Decimal) -> BankSnapshotRow {
    BankSnapshotRow {
        date: day(15),
        currency_id: EUR,
        movement_counter: 1,
        balance,
        interest_earned: Decimal::ZERO,
        fees_paid: Decimal::ZERO,
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mock Movement Source
// ═══════════════════════════════════════════════════════════════════

/// In-memory movement persistence with call accounting.
#[derive(Default)]
pub struct MockMovementSource {
    pub broker_movements: Mutex<Vec<BrokerMovementRow>>,
    pub trades: Mutex<Vec<TradeRow>>,
    pub dividends: Mutex<Vec<DividendRow>>,
    pub dividend_dates: Mutex<Vec<DividendDateRow>>,
    pub dividend_taxes: Mutex<Vec<DividendRow>>,
    pub option_trades: Mutex<Vec<OptionTradeRow>>,
    pub bank_movements: Mutex<Vec<BankAccountMovementRow>>,
    /// Delay applied to every broker movement fetch
    pub delay: Mutex<Option<Duration>>,
    pub fail: AtomicBool,
    /// Broker movement fetches, i.e. one per broker account per pass
    pub broker_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockMovementSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn broker_calls(&self) -> usize {
        self.broker_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence("database is locked".into()));
        }
        Ok(())
    }
}

fn page<R: Clone>(
    rows: &Mutex<Vec<R>>,
    belongs: impl Fn(&R) -> bool,
    timestamp: impl Fn(&R) -> NaiveDateTime,
    offset: usize,
    limit: usize,
) -> Vec<R> {
    let mut selected: Vec<R> = rows.lock().unwrap().iter().filter(|r| belongs(r)).cloned().collect();
    selected.sort_by(|a, b| timestamp(b).cmp(&timestamp(a)));
    selected.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl MovementSource for MockMovementSource {
    async fn broker_movements(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BrokerMovementRow>, CoreError> {
        self.broker_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.check()?;
        Ok(page(
            &self.broker_movements,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn trades(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TradeRow>, CoreError> {
        self.check()?;
        Ok(page(
            &self.trades,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn dividends(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendRow>, CoreError> {
        Ok(page(
            &self.dividends,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn dividend_dates(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendDateRow>, CoreError> {
        Ok(page(
            &self.dividend_dates,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn dividend_taxes(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DividendRow>, CoreError> {
        Ok(page(
            &self.dividend_taxes,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn option_trades(
        &self,
        broker_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<OptionTradeRow>, CoreError> {
        Ok(page(
            &self.option_trades,
            |r| r.broker_account_id == broker_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn bank_account_movements(
        &self,
        bank_account_id: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BankAccountMovementRow>, CoreError> {
        self.check()?;
        Ok(page(
            &self.bank_movements,
            |r| r.bank_account_id == bank_account_id,
            |r| r.timestamp,
            offset,
            limit,
        ))
    }

    async fn broker_account_has_movements(
        &self,
        broker_account_id: i32,
    ) -> Result<bool, CoreError> {
        let id = broker_account_id;
        Ok(self.broker_movements.lock().unwrap().iter().any(|r| r.broker_account_id == id)
            || self.trades.lock().unwrap().iter().any(|r| r.broker_account_id == id)
            || self.dividends.lock().unwrap().iter().any(|r| r.broker_account_id == id)
            || self.option_trades.lock().unwrap().iter().any(|r| r.broker_account_id == id))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mock Snapshot Source
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MockSnapshotSource {
    pub brokers: Mutex<HashMap<i32, FinancialSnapshotRow>>,
    pub broker_accounts: Mutex<HashMap<i32, FinancialSnapshotRow>>,
    pub banks: Mutex<HashMap<i32, BankSnapshotRow>>,
    pub bank_accounts: Mutex<HashMap<i32, BankSnapshotRow>>,
    /// Fail every broker (not broker-account) read
    pub fail_brokers: AtomicBool,
    pub reads: AtomicUsize,
}

impl MockSnapshotSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn broker_snapshot(
        &self,
        broker_id: i32,
    ) -> Result<Option<FinancialSnapshotRow>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_brokers.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence("broker snapshot table missing".into()));
        }
        Ok(self.brokers.lock().unwrap().get(&broker_id).cloned())
    }

    async fn broker_account_snapshot(
        &self,
        broker_account_id: i32,
    ) -> Result<Option<FinancialSnapshotRow>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.broker_accounts.lock().unwrap().get(&broker_account_id).cloned())
    }

    async fn bank_snapshot(&self, bank_id: i32) -> Result<Option<BankSnapshotRow>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.banks.lock().unwrap().get(&bank_id).cloned())
    }

    async fn bank_account_snapshot(
        &self,
        bank_account_id: i32,
    ) -> Result<Option<BankSnapshotRow>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.bank_accounts.lock().unwrap().get(&bank_account_id).cloned())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Async helpers
// ═══════════════════════════════════════════════════════════════════

/// Poll `condition` every 10ms for up to two seconds.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
