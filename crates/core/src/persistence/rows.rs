//! Row shapes as the persistence layer returns them: foreign keys are plain
//! ids, resolved through the lookup caches during conversion.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::movement::{
    BankAccountMovementType, BrokerMovementType, DividendCode, OptionType, TradeCode, TradeType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerMovementRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub currency_id: i32,
    pub broker_account_id: i32,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub movement_type: BrokerMovementType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub from_currency_id: Option<i32>,
    #[serde(default)]
    pub amount_changed: Option<Decimal>,
    #[serde(default)]
    pub ticker_id: Option<i32>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub ticker_id: i32,
    pub broker_account_id: i32,
    pub currency_id: i32,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub trade_code: TradeCode,
    pub trade_type: TradeType,
    pub leveraged: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Shared shape of dividend, dividend-date and dividend-tax rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub ticker_id: i32,
    pub currency_id: i32,
    pub broker_account_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendDateRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub ticker_id: i32,
    pub currency_id: i32,
    pub broker_account_id: i32,
    pub code: DividendCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTradeRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub expiration_date: NaiveDateTime,
    pub premium: Decimal,
    pub net_premium: Decimal,
    pub ticker_id: i32,
    pub broker_account_id: i32,
    pub currency_id: i32,
    pub option_type: OptionType,
    pub code: TradeCode,
    pub strike: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub is_open: bool,
    #[serde(default)]
    pub closed_with: Option<i32>,
    pub multiplier: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountMovementRow {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub bank_account_id: i32,
    pub currency_id: i32,
    pub movement_type: BankAccountMovementType,
}

// ── Snapshot rows ───────────────────────────────────────────────────

/// Stored per-ticker position figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    pub ticker_id: i32,
    pub total_shares: Decimal,
    pub latest_price: Decimal,
    pub cost_basis: Decimal,
    pub realized: Decimal,
}

/// One persisted option record, reduced to what the open-position rule needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLegRow {
    pub ticker_id: i32,
    pub currency_id: i32,
    pub broker_account_id: i32,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiration_date: NaiveDateTime,
    pub code: TradeCode,
}

/// Latest stored financial snapshot of a broker or broker account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshotRow {
    pub date: NaiveDate,
    pub currency_id: i32,
    pub movement_counter: i32,
    pub deposited: Decimal,
    pub withdrawn: Decimal,
    pub invested: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub dividends_received: Decimal,
    pub options_income: Decimal,
    /// Realized gains not attributable to a listed position
    pub realized_gains: Decimal,
    pub positions: Vec<PositionRow>,
    pub option_legs: Vec<OptionLegRow>,
}

/// Latest stored snapshot of a bank or bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSnapshotRow {
    pub date: NaiveDate,
    pub currency_id: i32,
    pub movement_counter: i32,
    pub balance: Decimal,
    pub interest_earned: Decimal,
    pub fees_paid: Decimal,
}
