//! FIFO lot matching for options and stock trades.
//!
//! Options are matched record by record, so every persisted option record
//! must hold exactly one contract. [`expand_option_trade`] performs that
//! normalization; UI creation and import both go through it.

use chrono::NaiveDateTime;
use log::warn;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use crate::models::movement::{OptionTrade, OptionType, Trade, TradeCode};
use crate::persistence::rows::OptionLegRow;

/// Instrument identity: openings only ever match closings of the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionGroupKey {
    pub ticker_id: i32,
    pub currency_id: i32,
    pub broker_account_id: i32,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiration_date: NaiveDateTime,
}

impl From<&OptionTrade> for OptionGroupKey {
    fn from(trade: &OptionTrade) -> Self {
        Self {
            ticker_id: trade.ticker.id,
            currency_id: trade.currency.id,
            broker_account_id: trade.broker_account.id,
            option_type: trade.option_type,
            strike: trade.strike,
            expiration_date: trade.expiration_date,
        }
    }
}

impl From<&OptionLegRow> for OptionGroupKey {
    fn from(leg: &OptionLegRow) -> Self {
        Self {
            ticker_id: leg.ticker_id,
            currency_id: leg.currency_id,
            broker_account_id: leg.broker_account_id,
            option_type: leg.option_type,
            strike: leg.strike,
            expiration_date: leg.expiration_date,
        }
    }
}

// ── Contract expansion ──────────────────────────────────────────────

/// Split a multi-contract record into `quantity` single-contract records.
///
/// Premium stays per contract; net premium, commissions and fees are split
/// evenly, with the rounding remainder carried by the last record so the
/// totals are preserved. All records keep the source id and timestamp.
/// A record with no contracts expands to nothing.
#[must_use]
pub fn expand_option_trade(trade: &OptionTrade) -> Vec<OptionTrade> {
    match trade.quantity {
        0 => {
            warn!("Option trade {} holds no contracts, skipped", trade.id);
            return Vec::new();
        }
        1 => return vec![trade.clone()],
        _ => {}
    }

    let count = trade.quantity as usize;
    let contracts = Decimal::from(trade.quantity);
    let share = |total: Decimal| (total / contracts).round_dp(6);
    let (net_each, commissions_each, fees_each) = (
        share(trade.net_premium),
        share(trade.commissions),
        share(trade.fees),
    );
    let rest = Decimal::from(trade.quantity - 1);

    (0..count)
        .map(|i| {
            let last = i == count - 1;
            let pick = |each: Decimal, total: Decimal| {
                if last {
                    total - each * rest
                } else {
                    each
                }
            };
            OptionTrade {
                quantity: 1,
                net_premium: pick(net_each, trade.net_premium),
                commissions: pick(commissions_each, trade.commissions),
                fees: pick(fees_each, trade.fees),
                ..trade.clone()
            }
        })
        .collect()
}

/// Expand every record, preserving input order.
#[must_use]
pub fn expand_option_trades(trades: &[OptionTrade]) -> Vec<OptionTrade> {
    trades.iter().flat_map(expand_option_trade).collect()
}

// ── Option FIFO linking ─────────────────────────────────────────────

/// One opening record closed by one closing record.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionLink {
    pub opening_id: i32,
    pub closing_id: i32,
    /// Sum of both net premiums
    pub realized: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionLinkOutcome {
    pub links: Vec<OptionLink>,
    pub realized: Decimal,
    /// Closing records with no open counterpart left
    pub unmatched_closings: usize,
}

/// Link closing records to the earliest still-open opening record of the
/// same instrument group (timestamp first, then persisted id).
///
/// Matched openings get `is_open = false` and `closed_with = Some(closing id)`;
/// closing records point back at the opening they consumed. Openings already
/// closed are left alone, and closings they reference are not re-applied, so
/// running this twice over the same records is a no-op. Unmatched openings
/// stay open with `closed_with = None`.
pub fn link_option_trades(trades: &mut [OptionTrade]) -> OptionLinkOutcome {
    let mut order: Vec<usize> = (0..trades.len()).collect();
    order.sort_by(|&a, &b| {
        trades[a]
            .timestamp
            .cmp(&trades[b].timestamp)
            .then(trades[a].id.cmp(&trades[b].id))
    });

    // Closings already applied by an earlier run, per closing id
    let mut consumed: HashMap<i32, usize> = HashMap::new();
    for trade in trades.iter().filter(|t| t.code.is_opening()) {
        if let (false, Some(closing_id)) = (trade.is_open, trade.closed_with) {
            *consumed.entry(closing_id).or_insert(0) += 1;
        }
    }

    let mut open: HashMap<(OptionGroupKey, TradeCode), VecDeque<usize>> = HashMap::new();
    let mut outcome = OptionLinkOutcome::default();

    for index in order {
        let code = trades[index].code;
        let group = OptionGroupKey::from(&trades[index]);

        if code.is_opening() {
            if trades[index].is_open {
                open.entry((group, code)).or_default().push_back(index);
            }
            continue;
        }

        let closing_id = trades[index].id;
        if let Some(remaining) = consumed.get_mut(&closing_id).filter(|n| **n > 0) {
            *remaining -= 1;
            continue;
        }

        let Some(opening_code) = code.opening_counterpart() else {
            continue;
        };
        let Some(opening) = open
            .get_mut(&(group, opening_code))
            .and_then(VecDeque::pop_front)
        else {
            warn!(
                "Option record {} ({}) has no open {} to close",
                closing_id, code, opening_code
            );
            trades[index].is_open = false;
            outcome.unmatched_closings += 1;
            continue;
        };

        let realized = trades[opening].net_premium + trades[index].net_premium;
        let opening_id = trades[opening].id;

        trades[opening].is_open = false;
        trades[opening].closed_with = Some(closing_id);
        trades[index].is_open = false;
        trades[index].closed_with = Some(opening_id);

        outcome.realized += realized;
        outcome.links.push(OptionLink {
            opening_id,
            closing_id,
            realized,
        });
    }

    outcome
}

/// Expand every record into one-contract units, link the units, then fold
/// the result back onto the source records.
///
/// A source record stays open while any of its units is open; `closed_with`
/// takes the last link of its units. The record count is unchanged, so feed
/// keys stay unique.
pub fn settle_option_trades(trades: &mut [OptionTrade]) -> OptionLinkOutcome {
    let mut units = Vec::new();
    let mut origin = Vec::new();
    for (index, trade) in trades.iter().enumerate() {
        for unit in expand_option_trade(trade) {
            units.push(unit);
            origin.push(index);
        }
    }

    let outcome = link_option_trades(&mut units);

    let mut settled: Vec<(bool, Option<i32>)> =
        trades.iter().map(|t| (false, t.closed_with)).collect();
    for (unit, &index) in units.iter().zip(&origin) {
        let (open, closed_with) = &mut settled[index];
        *open |= unit.is_open;
        if unit.closed_with.is_some() {
            *closed_with = unit.closed_with;
        }
    }
    // Zero-contract records took no part in the matching
    for (trade, (open, closed_with)) in trades
        .iter_mut()
        .zip(settled)
        .filter(|(trade, _)| trade.quantity > 0)
    {
        trade.is_open = open;
        trade.closed_with = closed_with;
    }

    outcome
}

// ── Stock FIFO ──────────────────────────────────────────────────────

#[derive(Debug)]
struct Lot {
    quantity: Decimal,
    /// Cost (long) or proceeds (short) per share, costs included
    unit_value: Decimal,
}

type LotKey = (i32, i32, i32, bool);

/// Realized gains of stock trades with FIFO lot matching per
/// (ticker, currency, account). Longs open with BuyToOpen and close with
/// SellToClose; shorts open with SellToOpen and close with BuyToClose.
/// Commissions and fees reduce the result. Trades are processed by
/// timestamp then id; closing quantity with no open lot is ignored.
#[must_use]
pub fn realized_stock_gains(trades: &[Trade]) -> Decimal {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

    let mut lots: HashMap<LotKey, VecDeque<Lot>> = HashMap::new();
    let mut realized = Decimal::ZERO;

    for trade in ordered {
        if trade.quantity.is_zero() {
            continue;
        }
        let costs = trade.commissions + trade.fees;
        let long = matches!(trade.trade_code, TradeCode::BuyToOpen | TradeCode::SellToClose);
        let key = (trade.ticker.id, trade.currency.id, trade.broker_account.id, long);

        match trade.trade_code {
            TradeCode::BuyToOpen => lots.entry(key).or_default().push_back(Lot {
                quantity: trade.quantity,
                unit_value: trade.price + costs / trade.quantity,
            }),
            TradeCode::SellToOpen => lots.entry(key).or_default().push_back(Lot {
                quantity: trade.quantity,
                unit_value: trade.price - costs / trade.quantity,
            }),
            TradeCode::SellToClose | TradeCode::BuyToClose => {
                let unit_close = if long {
                    trade.price - costs / trade.quantity
                } else {
                    trade.price + costs / trade.quantity
                };
                let queue = lots.entry(key).or_default();
                let mut remaining = trade.quantity;
                while remaining > Decimal::ZERO {
                    let Some(lot) = queue.front_mut() else {
                        warn!(
                            "Trade {} closes {} more shares of ticker {} than are open",
                            trade.id, remaining, trade.ticker.id
                        );
                        break;
                    };
                    let matched = remaining.min(lot.quantity);
                    realized += if long {
                        (unit_close - lot.unit_value) * matched
                    } else {
                        (lot.unit_value - unit_close) * matched
                    };
                    lot.quantity -= matched;
                    remaining -= matched;
                    if lot.quantity.is_zero() {
                        queue.pop_front();
                    }
                }
            }
        }
    }

    realized
}

// ── Open-position rule ──────────────────────────────────────────────

/// True when shares are held, or any option group has a non-zero net
/// position (BuyToOpen +1, SellToOpen −1, BuyToClose −1, SellToClose +1).
#[must_use]
pub fn has_open_positions(
    total_shares: Decimal,
    option_legs: impl IntoIterator<Item = (OptionGroupKey, TradeCode)>,
) -> bool {
    if total_shares > Decimal::ZERO {
        return true;
    }
    let mut net: HashMap<OptionGroupKey, i64> = HashMap::new();
    for (group, code) in option_legs {
        *net.entry(group).or_insert(0) += code.position_sign();
    }
    net.values().any(|position| *position != 0)
}

/// Legs of a set of option records, ready for [`has_open_positions`].
pub fn option_legs(
    trades: &[OptionTrade],
) -> impl Iterator<Item = (OptionGroupKey, TradeCode)> + '_ {
    trades.iter().map(|t| (OptionGroupKey::from(t), t.code))
}
