// src/ledger.rs
//! The trading ledger: the only path that changes a portfolio.
//!
//! A trade is loaded, checked and applied in memory, then committed together
//! with its transaction record. Trades for one user run one at a time; a
//! version conflict at commit (another process got there first) restarts the
//! cycle from a fresh load.

use crate::error::{LedgerError, StoreError};
use crate::locks::UserLocks;
use crate::models::{Portfolio, TradeOrder, TradeType, Transaction, TransactionRequest, UserId};
use crate::portfolio;
use crate::store::Store;
use log::{error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct Ledger {
    store: Arc<dyn Store>,
    locks: UserLocks,
    initial_wallet: Decimal,
    max_commit_retries: u32,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, initial_wallet: Decimal, max_commit_retries: u32) -> Self {
        Ledger {
            store,
            locks: UserLocks::new(),
            initial_wallet,
            max_commit_retries,
        }
    }

    pub async fn record_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        let order = TradeOrder::try_from(request)?;
        let _guard = self.locks.acquire(&order.user_id).await;

        let mut attempt = 0;
        loop {
            match self.execute(&order).await {
                Err(LedgerError::Persistence(StoreError::Conflict))
                    if attempt < self.max_commit_retries =>
                {
                    attempt += 1;
                    warn!(
                        "Portfolio for {} changed underneath trade, retry {}/{}",
                        order.user_id, attempt, self.max_commit_retries
                    );
                }
                Err(LedgerError::Persistence(e)) => {
                    error!("Failed to commit trade for {}: {}", order.user_id, e);
                    return Err(LedgerError::Persistence(e));
                }
                other => return other,
            }
        }
    }

    async fn execute(&self, order: &TradeOrder) -> Result<Transaction, LedgerError> {
        let previous = self.store.load_portfolio(order.user_id.as_str()).await?;
        let mut next = match &previous {
            Some(current) => current.clone(),
            None => Portfolio::new(order.user_id.clone(), self.initial_wallet),
        };

        let profit_or_loss = portfolio::apply(&mut next, order)?;
        next.version = previous.as_ref().map_or(0, |p| p.version) + 1;

        let transaction = Transaction::record(order, profit_or_loss);
        self.store
            .commit_trade(previous.as_ref(), &next, &transaction)
            .await?;

        match order.kind {
            TradeType::Buy => info!(
                "{} bought {} {} @ {}, wallet {}",
                order.user_id, order.quantity, order.symbol, order.price, next.wallet
            ),
            TradeType::Sell => info!(
                "{} sold {} {} @ {}, P/L {}, wallet {}",
                order.user_id,
                order.quantity,
                order.symbol,
                order.price,
                profit_or_loss.unwrap_or_default(),
                next.wallet
            ),
        }
        Ok(transaction)
    }

    /// Exact lookup first, then a scan comparing identifiers loosely.
    pub async fn portfolio(&self, user_id: &str) -> Result<Portfolio, LedgerError> {
        if let Some(found) = self.store.load_portfolio(user_id).await? {
            return Ok(found);
        }
        self.store
            .scan_portfolios()
            .await?
            .into_iter()
            .find(|p| p.user_id.matches_loosely(user_id))
            .ok_or(LedgerError::NotFound)
    }

    pub async fn transaction_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let user_id = UserId::parse(user_id)?;
        Ok(self.store.transactions_for(user_id.as_str()).await?)
    }

    pub async fn total_profit_or_loss(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.transaction_history(user_id)
            .await?
            .iter()
            .filter(|t| t.kind == TradeType::Sell)
            .filter_map(|t| t.profit_or_loss)
            .try_fold(Decimal::ZERO, |total, pnl| {
                total.checked_add(pnl).ok_or_else(LedgerError::out_of_range)
            })
    }
}
