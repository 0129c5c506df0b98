//! Pure financial formulas over stored snapshot fields. No I/O, never fail.

use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Unrealized gain of a position: `latest_price × total_shares − cost_basis`.
///
/// Returns zero when no shares are held, whatever price and cost say.
/// Negative results are losses.
#[must_use]
pub fn unrealized(total_shares: Decimal, latest_price: Decimal, cost_basis: Decimal) -> Decimal {
    if total_shares.is_zero() {
        return Decimal::ZERO;
    }
    latest_price * total_shares - cost_basis
}

/// Total return in percent: `(unrealized + realized) / cost_basis × 100`.
///
/// Returns zero when `cost_basis` is zero.
#[must_use]
pub fn performance(unrealized: Decimal, realized: Decimal, cost_basis: Decimal) -> Decimal {
    if cost_basis.is_zero() {
        return Decimal::ZERO;
    }
    (unrealized + realized) / cost_basis * HUNDRED
}

/// Share of a position in the whole portfolio, in percent.
///
/// The denominator comes from an aggregation pass over every position
/// (see [`portfolio_weights`]). An empty portfolio weighs zero.
#[must_use]
pub fn portfolio_weight(position_value: Decimal, total_portfolio_value: Decimal) -> Decimal {
    if total_portfolio_value.is_zero() {
        return Decimal::ZERO;
    }
    position_value / total_portfolio_value * HUNDRED
}

/// Weights of every position value, in input order.
#[must_use]
pub fn portfolio_weights(position_values: &[Decimal]) -> Vec<Decimal> {
    let total: Decimal = position_values.iter().copied().sum();
    position_values
        .iter()
        .map(|value| portfolio_weight(*value, total))
        .collect()
}
