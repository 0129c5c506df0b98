use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{AccountKey, BankAccount, BrokerAccount};
use super::currency::Currency;
use super::ticker::Ticker;

// ── Codes & Types ───────────────────────────────────────────────────

/// Cash movement kinds on a broker account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerMovementType {
    Deposit,
    Withdrawal,
    Fee,
    InterestsGained,
    InterestsPaid,
    Lending,
    Conversion,
    AcatMoneyTransfer,
    AcatSecuritiesTransfer,
}

/// Direction of a stock or option trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeCode {
    BuyToOpen,
    SellToOpen,
    BuyToClose,
    SellToClose,
}

impl TradeCode {
    #[must_use]
    pub fn is_opening(self) -> bool {
        matches!(self, TradeCode::BuyToOpen | TradeCode::SellToOpen)
    }

    /// Contribution of one contract/share to the net position:
    /// BuyToOpen +1, SellToOpen -1, BuyToClose -1, SellToClose +1.
    #[must_use]
    pub fn position_sign(self) -> i64 {
        match self {
            TradeCode::BuyToOpen | TradeCode::SellToClose => 1,
            TradeCode::SellToOpen | TradeCode::BuyToClose => -1,
        }
    }

    /// The opening code a closing `self` offsets.
    #[must_use]
    pub fn opening_counterpart(self) -> Option<TradeCode> {
        match self {
            TradeCode::BuyToClose => Some(TradeCode::SellToOpen),
            TradeCode::SellToClose => Some(TradeCode::BuyToOpen),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeCode::BuyToOpen => write!(f, "BuyToOpen"),
            TradeCode::SellToOpen => write!(f, "SellToOpen"),
            TradeCode::BuyToClose => write!(f, "BuyToClose"),
            TradeCode::SellToClose => write!(f, "SellToClose"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DividendCode {
    ExDividendDate,
    PayDividendDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankAccountMovementType {
    Balance,
    Interest,
    Fee,
}

// ── Movement payloads ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerMovement {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub currency: Currency,
    pub broker_account: BrokerAccount,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub movement_type: BrokerMovementType,
    #[serde(default)]
    pub notes: Option<String>,
    /// Source currency of a conversion
    #[serde(default)]
    pub from_currency: Option<Currency>,
    #[serde(default)]
    pub amount_changed: Option<Decimal>,
    /// Set for securities transfers
    #[serde(default)]
    pub ticker: Option<Ticker>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub ticker: Ticker,
    pub broker_account: BrokerAccount,
    pub currency: Currency,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub ticker: Ticker,
    pub currency: Currency,
    pub broker_account: BrokerAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendDate {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub ticker: Ticker,
    pub currency: Currency,
    pub broker_account: BrokerAccount,
    pub code: DividendCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendTax {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub ticker: Ticker,
    pub currency: Currency,
    pub broker_account: BrokerAccount,
}

/// A single option record. Persisted records always hold exactly one
/// contract (`quantity == 1`) so FIFO linking stays one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTrade {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub expiration_date: NaiveDateTime,
    /// Premium per contract, before multiplier
    pub premium: Decimal,
    /// Signed cash effect (credit positive, debit negative) after costs
    pub net_premium: Decimal,
    pub ticker: Ticker,
    pub broker_account: BrokerAccount,
    pub currency: Currency,
    pub option_type: OptionType,
    pub code: TradeCode,
    pub strike: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    pub is_open: bool,
    /// Id of the record that closed this one
    #[serde(default)]
    pub closed_with: Option<i32>,
    pub multiplier: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountMovement {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub amount: Decimal,
    pub bank_account: BankAccount,
    pub currency: Currency,
    pub movement_type: BankAccountMovementType,
}

// ── Unified feed entry ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MovementKind {
    BrokerMovement,
    Trade,
    Dividend,
    DividendDate,
    DividendTax,
    OptionTrade,
    BankAccountMovement,
}

/// Stable identity of a feed entry: persisted ids are only unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementKey {
    pub kind: MovementKind,
    pub id: i32,
}

/// One entry of the unified, time-ordered Movements feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Movement {
    BrokerMovement(BrokerMovement),
    Trade(Trade),
    Dividend(Dividend),
    DividendDate(DividendDate),
    DividendTax(DividendTax),
    OptionTrade(OptionTrade),
    BankAccountMovement(BankAccountMovement),
}

impl Movement {
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Movement::BrokerMovement(m) => m.timestamp,
            Movement::Trade(m) => m.timestamp,
            Movement::Dividend(m) => m.timestamp,
            Movement::DividendDate(m) => m.timestamp,
            Movement::DividendTax(m) => m.timestamp,
            Movement::OptionTrade(m) => m.timestamp,
            Movement::BankAccountMovement(m) => m.timestamp,
        }
    }

    #[must_use]
    pub fn kind(&self) -> MovementKind {
        match self {
            Movement::BrokerMovement(_) => MovementKind::BrokerMovement,
            Movement::Trade(_) => MovementKind::Trade,
            Movement::Dividend(_) => MovementKind::Dividend,
            Movement::DividendDate(_) => MovementKind::DividendDate,
            Movement::DividendTax(_) => MovementKind::DividendTax,
            Movement::OptionTrade(_) => MovementKind::OptionTrade,
            Movement::BankAccountMovement(_) => MovementKind::BankAccountMovement,
        }
    }

    #[must_use]
    pub fn key(&self) -> MovementKey {
        let id = match self {
            Movement::BrokerMovement(m) => m.id,
            Movement::Trade(m) => m.id,
            Movement::Dividend(m) => m.id,
            Movement::DividendDate(m) => m.id,
            Movement::DividendTax(m) => m.id,
            Movement::OptionTrade(m) => m.id,
            Movement::BankAccountMovement(m) => m.id,
        };
        MovementKey {
            kind: self.kind(),
            id,
        }
    }

    /// The account this movement belongs to.
    #[must_use]
    pub fn account_key(&self) -> AccountKey {
        match self {
            Movement::BrokerMovement(m) => AccountKey::Broker(m.broker_account.id),
            Movement::Trade(m) => AccountKey::Broker(m.broker_account.id),
            Movement::Dividend(m) => AccountKey::Broker(m.broker_account.id),
            Movement::DividendDate(m) => AccountKey::Broker(m.broker_account.id),
            Movement::DividendTax(m) => AccountKey::Broker(m.broker_account.id),
            Movement::OptionTrade(m) => AccountKey::Broker(m.broker_account.id),
            Movement::BankAccountMovement(m) => AccountKey::Bank(m.bank_account.id),
        }
    }
}
