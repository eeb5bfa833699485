// src/portfolio.rs
//! Cash and position bookkeeping for a single portfolio.
//!
//! Each position keeps one blended weighted-average cost; there is no lot
//! tracking. Every check runs before the first field is touched, so a
//! rejected trade leaves the portfolio exactly as it was.

use crate::error::LedgerError;
use crate::models::{Portfolio, Position, TradeOrder, TradeType};
use rust_decimal::Decimal;

fn amount(quantity: u64, price: Decimal) -> Result<Decimal, LedgerError> {
    Decimal::from(quantity)
        .checked_mul(price)
        .ok_or_else(LedgerError::out_of_range)
}

/// Applies the order and returns the realized profit or loss for sells.
pub fn apply(
    portfolio: &mut Portfolio,
    order: &TradeOrder,
) -> Result<Option<Decimal>, LedgerError> {
    match order.kind {
        TradeType::Buy => {
            apply_buy(portfolio, &order.symbol, order.quantity, order.price)?;
            Ok(None)
        }
        TradeType::Sell => {
            apply_sell(portfolio, &order.symbol, order.quantity, order.price).map(Some)
        }
    }
}

pub fn apply_buy(
    portfolio: &mut Portfolio,
    symbol: &str,
    quantity: u64,
    price: Decimal,
) -> Result<(), LedgerError> {
    let cost = amount(quantity, price)?;
    if portfolio.wallet < cost {
        return Err(LedgerError::InsufficientFunds);
    }

    let updated = match portfolio.position(symbol) {
        None => Position {
            symbol: symbol.to_string(),
            quantity,
            average_price: price,
            invested_amount: cost,
        },
        Some(held) => {
            let new_quantity = held
                .quantity
                .checked_add(quantity)
                .ok_or_else(LedgerError::out_of_range)?;
            let new_invested = amount(held.quantity, held.average_price)?
                .checked_add(cost)
                .ok_or_else(LedgerError::out_of_range)?;
            let new_average = new_invested
                .checked_div(Decimal::from(new_quantity))
                .ok_or_else(LedgerError::out_of_range)?;
            Position {
                symbol: symbol.to_string(),
                quantity: new_quantity,
                average_price: new_average,
                invested_amount: new_invested,
            }
        }
    };
    let fund = portfolio
        .investment_fund
        .checked_add(cost)
        .ok_or_else(LedgerError::out_of_range)?;

    portfolio.wallet -= cost;
    portfolio.investment_fund = fund;
    match portfolio.stocks.iter_mut().find(|p| p.symbol == symbol) {
        Some(slot) => *slot = updated,
        None => portfolio.stocks.push(updated),
    }
    Ok(())
}

/// Sells against the current average price. A position sold down to zero is
/// removed from the portfolio.
pub fn apply_sell(
    portfolio: &mut Portfolio,
    symbol: &str,
    quantity: u64,
    price: Decimal,
) -> Result<Decimal, LedgerError> {
    let index = portfolio
        .stocks
        .iter()
        .position(|p| p.symbol == symbol)
        .ok_or(LedgerError::NoSuchPosition)?;
    let held = &portfolio.stocks[index];
    if quantity > held.quantity {
        return Err(LedgerError::InsufficientQuantity);
    }

    let sell_value = amount(quantity, price)?;
    let cost_basis = amount(quantity, held.average_price)?;
    let profit_or_loss = sell_value - cost_basis;
    let remaining = held.quantity - quantity;
    let remaining_invested = amount(remaining, held.average_price)?;
    let wallet = portfolio
        .wallet
        .checked_add(sell_value)
        .ok_or_else(LedgerError::out_of_range)?;

    portfolio.wallet = wallet;
    portfolio.investment_fund -= cost_basis;
    if remaining == 0 {
        portfolio.stocks.remove(index);
    } else {
        let slot = &mut portfolio.stocks[index];
        slot.quantity = remaining;
        slot.invested_amount = remaining_invested;
    }
    Ok(profit_or_loss)
}
