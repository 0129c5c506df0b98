//! Persisted rows → unified [`Movement`] entries.
//!
//! Foreign keys are resolved through the lookup caches, so a conversion only
//! fails when a referenced entity is missing from the store altogether.

use crate::cache::LookupCaches;
use crate::errors::CoreError;
use crate::models::movement::{
    BankAccountMovement, BrokerMovement, Dividend, DividendDate, DividendTax, Movement,
    OptionTrade, Trade,
};
use crate::persistence::rows::{
    BankAccountMovementRow, BrokerMovementRow, DividendDateRow, DividendRow, OptionTradeRow,
    TradeRow,
};

/// Stateless converter borrowing the caches for id resolution.
pub struct MovementConverter<'a> {
    caches: &'a LookupCaches,
}

impl<'a> MovementConverter<'a> {
    pub fn new(caches: &'a LookupCaches) -> Self {
        Self { caches }
    }

    pub fn broker_movement(&self, row: &BrokerMovementRow) -> Result<Movement, CoreError> {
        let c = self.caches;
        let from_currency = row
            .from_currency_id
            .map(|id| c.currencies.get_currency_by_id_fast(id))
            .transpose()?;
        let ticker = row
            .ticker_id
            .map(|id| c.tickers.get_ticker_by_id_fast(id))
            .transpose()?;

        Ok(Movement::BrokerMovement(BrokerMovement {
            id: row.id,
            timestamp: row.timestamp,
            amount: row.amount,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
            commissions: row.commissions,
            fees: row.fees,
            movement_type: row.movement_type,
            notes: row.notes.clone(),
            from_currency,
            amount_changed: row.amount_changed,
            ticker,
            quantity: row.quantity,
        }))
    }

    pub fn trade(&self, row: &TradeRow) -> Result<Movement, CoreError> {
        let c = self.caches;
        Ok(Movement::Trade(Trade {
            id: row.id,
            timestamp: row.timestamp,
            ticker: c.tickers.get_ticker_by_id_fast(row.ticker_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            quantity: row.quantity,
            price: row.price,
            commissions: row.commissions,
            fees: row.fees,
            trade_code: row.trade_code,
            trade_type: row.trade_type,
            leveraged: row.leveraged,
            notes: row.notes.clone(),
        }))
    }

    pub fn dividend(&self, row: &DividendRow) -> Result<Movement, CoreError> {
        let c = self.caches;
        Ok(Movement::Dividend(Dividend {
            id: row.id,
            timestamp: row.timestamp,
            amount: row.amount,
            ticker: c.tickers.get_ticker_by_id_fast(row.ticker_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
        }))
    }

    pub fn dividend_date(&self, row: &DividendDateRow) -> Result<Movement, CoreError> {
        let c = self.caches;
        Ok(Movement::DividendDate(DividendDate {
            id: row.id,
            timestamp: row.timestamp,
            amount: row.amount,
            ticker: c.tickers.get_ticker_by_id_fast(row.ticker_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
            code: row.code,
        }))
    }

    pub fn dividend_tax(&self, row: &DividendRow) -> Result<Movement, CoreError> {
        let c = self.caches;
        Ok(Movement::DividendTax(DividendTax {
            id: row.id,
            timestamp: row.timestamp,
            amount: row.amount,
            ticker: c.tickers.get_ticker_by_id_fast(row.ticker_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
        }))
    }

    pub fn option_trade(&self, row: &OptionTradeRow) -> Result<Movement, CoreError> {
        self.option_record(row).map(Movement::OptionTrade)
    }

    /// The option record itself, before it is wrapped into the feed.
    pub fn option_record(&self, row: &OptionTradeRow) -> Result<OptionTrade, CoreError> {
        let c = self.caches;
        Ok(OptionTrade {
            id: row.id,
            timestamp: row.timestamp,
            expiration_date: row.expiration_date,
            premium: row.premium,
            net_premium: row.net_premium,
            ticker: c.tickers.get_ticker_by_id_fast(row.ticker_id)?,
            broker_account: c.broker_accounts.get_broker_account_fast(row.broker_account_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            option_type: row.option_type,
            code: row.code,
            strike: row.strike,
            commissions: row.commissions,
            fees: row.fees,
            is_open: row.is_open,
            closed_with: row.closed_with,
            multiplier: row.multiplier,
            quantity: row.quantity,
            notes: row.notes.clone(),
        })
    }

    pub fn bank_account_movement(
        &self,
        row: &BankAccountMovementRow,
    ) -> Result<Movement, CoreError> {
        let c = self.caches;
        Ok(Movement::BankAccountMovement(BankAccountMovement {
            id: row.id,
            timestamp: row.timestamp,
            amount: row.amount,
            bank_account: c.bank_accounts.get_bank_account_fast(row.bank_account_id)?,
            currency: c.currencies.get_currency_by_id_fast(row.currency_id)?,
            movement_type: row.movement_type,
        }))
    }

    /// Convert a batch, stopping at the first unresolved reference.
    pub fn convert_all<R>(
        &self,
        rows: &[R],
        convert: impl Fn(&Self, &R) -> Result<Movement, CoreError>,
    ) -> Result<Vec<Movement>, CoreError> {
        rows.iter().map(|row| convert(self, row)).collect()
    }
}
