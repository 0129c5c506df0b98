use serde::{Deserialize, Serialize};

use super::bank::Bank;
use super::broker::Broker;
use super::currency::Currency;

/// An investment account held at a broker.
///
/// `broker` and `currency` are denormalized copies, kept fresh by the
/// broker-account lookup cache when the parent entities are edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: i32,
    pub broker: Broker,
    /// Unique within the loaded account set, like `id`
    pub account_number: String,
    /// Base currency of the account
    pub currency: Currency,
}

/// A bank account. `bank` and `currency` are denormalized copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i32,
    pub bank: Bank,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub currency: Currency,
}

/// Which side of the app an account belongs to.
///
/// A proper sum type: an account can never carry both a broker and a
/// bank payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Broker(BrokerAccount),
    Bank(BankAccount),
    /// Placeholder shown while no account exists yet
    Empty,
}

/// Identity of an account inside the Accounts collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKey {
    Broker(i32),
    Bank(i32),
    Empty,
}

/// Entry of the Accounts collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub kind: AccountKind,
    /// Derived flag, recomputed after each movement aggregation pass
    #[serde(default)]
    pub has_movements: bool,
}

impl Account {
    pub fn broker(account: BrokerAccount) -> Self {
        Self {
            kind: AccountKind::Broker(account),
            has_movements: false,
        }
    }

    pub fn bank(account: BankAccount) -> Self {
        Self {
            kind: AccountKind::Bank(account),
            has_movements: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            kind: AccountKind::Empty,
            has_movements: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> AccountKey {
        match &self.kind {
            AccountKind::Broker(a) => AccountKey::Broker(a.id),
            AccountKind::Bank(a) => AccountKey::Bank(a.id),
            AccountKind::Empty => AccountKey::Empty,
        }
    }

    #[must_use]
    pub fn broker_account(&self) -> Option<&BrokerAccount> {
        match &self.kind {
            AccountKind::Broker(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn bank_account(&self) -> Option<&BankAccount> {
        match &self.kind {
            AccountKind::Bank(a) => Some(a),
            _ => None,
        }
    }

    /// Copy of this account with `has_movements` set.
    #[must_use]
    pub fn with_has_movements(&self, has_movements: bool) -> Self {
        Self {
            kind: self.kind.clone(),
            has_movements,
        }
    }
}
