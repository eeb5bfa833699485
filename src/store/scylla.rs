// src/store/scylla.rs
use super::Store;
use crate::error::StoreError;
use crate::models::{Portfolio, Position, TradeType, Transaction, UserId, Watchlist};
use ::scylla::frame::response::result::{CqlValue, Row};
use ::scylla::query::Query;
use ::scylla::{Session, SessionBuilder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const PORTFOLIO_COLUMNS: &str = "user_id, wallet, investment_fund, total_value, stocks, version";

/// Decimals are kept as text so no precision is lost in storage.
#[derive(Serialize, Deserialize)]
struct StoredPosition {
    symbol: String,
    quantity: u64,
    average_price: String,
    invested_amount: String,
}

pub struct ScyllaStore {
    session: Session,
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn corrupt(what: &str) -> StoreError {
    StoreError::Corrupt(what.to_string())
}

fn text_column(row: &Row, index: usize, name: &str) -> Result<String, StoreError> {
    row.columns
        .get(index)
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_text())
        .cloned()
        .ok_or_else(|| corrupt(name))
}

fn decimal_column(row: &Row, index: usize, name: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(&text_column(row, index, name)?).map_err(|_| corrupt(name))
}

fn bigint_column(row: &Row, index: usize, name: &str) -> Result<i64, StoreError> {
    row.columns
        .get(index)
        .and_then(|c| c.as_ref())
        .and_then(|v| v.as_bigint())
        .ok_or_else(|| corrupt(name))
}

fn unsigned_column(row: &Row, index: usize, name: &str) -> Result<u64, StoreError> {
    u64::try_from(bigint_column(row, index, name)?).map_err(|_| corrupt(name))
}

/// The `[applied]` flag of a lightweight transaction result.
fn was_applied(rows: Option<Vec<Row>>) -> bool {
    rows.and_then(|rows| rows.into_iter().next())
        .and_then(|row| row.columns.into_iter().next())
        .map(|value| matches!(value, Some(CqlValue::Boolean(true))))
        .unwrap_or(false)
}

/// The error a failed transaction insert reports. A revert that also fails
/// is logged; the insert error is what the caller sees.
fn insert_failure(
    insert: StoreError,
    reverted: Result<(), StoreError>,
    portfolio: &Portfolio,
) -> StoreError {
    if let Err(e) = reverted {
        error!(
            "Failed to revert portfolio for {} to version {}: {}",
            portfolio.user_id,
            portfolio.version.saturating_sub(1),
            e
        );
    }
    insert
}

fn encode_stocks(stocks: &[Position]) -> Result<String, StoreError> {
    let stored: Vec<StoredPosition> = stocks
        .iter()
        .map(|p| StoredPosition {
            symbol: p.symbol.clone(),
            quantity: p.quantity,
            average_price: p.average_price.to_string(),
            invested_amount: p.invested_amount.to_string(),
        })
        .collect();
    serde_json::to_string(&stored).map_err(backend)
}

fn decode_stocks(json: &str) -> Result<Vec<Position>, StoreError> {
    let stored: Vec<StoredPosition> =
        serde_json::from_str(json).map_err(|_| corrupt("stocks"))?;
    stored
        .into_iter()
        .map(|p| {
            Ok(Position {
                average_price: Decimal::from_str(&p.average_price)
                    .map_err(|_| corrupt("stocks.average_price"))?,
                invested_amount: Decimal::from_str(&p.invested_amount)
                    .map_err(|_| corrupt("stocks.invested_amount"))?,
                symbol: p.symbol,
                quantity: p.quantity,
            })
        })
        .collect()
}

fn portfolio_from_row(row: &Row) -> Result<Portfolio, StoreError> {
    let user_id = UserId::parse(&text_column(row, 0, "user_id")?)
        .map_err(|_| corrupt("user_id"))?;
    Ok(Portfolio {
        user_id,
        wallet: decimal_column(row, 1, "wallet")?,
        investment_fund: decimal_column(row, 2, "investment_fund")?,
        total_value: decimal_column(row, 3, "total_value")?,
        stocks: decode_stocks(&text_column(row, 4, "stocks")?)?,
        version: unsigned_column(row, 5, "version")?,
    })
}

fn transaction_from_row(row: &Row) -> Result<Transaction, StoreError> {
    let created_at = match row.columns.get(1).and_then(|c| c.as_ref()) {
        Some(CqlValue::Timestamp(ts)) => {
            DateTime::<Utc>::from_timestamp_millis(ts.num_milliseconds())
                .ok_or_else(|| corrupt("created_at"))?
        }
        _ => return Err(corrupt("created_at")),
    };
    let profit_or_loss = match row.columns.get(7).and_then(|c| c.as_ref()) {
        Some(value) => Some(
            value
                .as_text()
                .and_then(|t| Decimal::from_str(t).ok())
                .ok_or_else(|| corrupt("profit_or_loss"))?,
        ),
        None => None,
    };
    Ok(Transaction {
        user_id: UserId::parse(&text_column(row, 0, "user_id")?)
            .map_err(|_| corrupt("user_id"))?,
        created_at,
        id: text_column(row, 2, "id")?,
        symbol: text_column(row, 3, "symbol")?,
        kind: TradeType::from_str(&text_column(row, 4, "kind")?)
            .map_err(|_| corrupt("kind"))?,
        quantity: unsigned_column(row, 5, "quantity")?,
        price: decimal_column(row, 6, "price")?,
        profit_or_loss,
    })
}

impl ScyllaStore {
    pub async fn connect(node: &str) -> Result<Self, StoreError> {
        let session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(backend)?;

        session.query("CREATE KEYSPACE IF NOT EXISTS portfolio_ledger WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await.map_err(backend)?;
        session.query("CREATE TABLE IF NOT EXISTS portfolio_ledger.portfolios (user_id TEXT PRIMARY KEY, wallet TEXT, investment_fund TEXT, total_value TEXT, stocks TEXT, version BIGINT)", &[]).await.map_err(backend)?;
        session.query("CREATE TABLE IF NOT EXISTS portfolio_ledger.transactions (user_id TEXT, created_at TIMESTAMP, id TEXT, symbol TEXT, kind TEXT, quantity BIGINT, price TEXT, profit_or_loss TEXT, PRIMARY KEY (user_id, created_at, id)) WITH CLUSTERING ORDER BY (created_at DESC, id DESC)", &[]).await.map_err(backend)?;
        session.query("CREATE TABLE IF NOT EXISTS portfolio_ledger.watchlists (user_id TEXT PRIMARY KEY, symbols TEXT)", &[]).await.map_err(backend)?;

        info!("Connected to ScyllaDB at {}.", node);
        Ok(ScyllaStore { session })
    }

    /// Conditional write of `next` over whatever `previous` describes.
    async fn swap_portfolio(
        &self,
        previous: Option<&Portfolio>,
        next: &Portfolio,
    ) -> Result<bool, StoreError> {
        let stocks = encode_stocks(&next.stocks)?;
        let result = match previous {
            None => {
                let query = Query::new(format!(
                    "INSERT INTO portfolio_ledger.portfolios ({}) VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                    PORTFOLIO_COLUMNS
                ));
                self.session
                    .query(
                        query,
                        (
                            next.user_id.as_str(),
                            next.wallet.to_string(),
                            next.investment_fund.to_string(),
                            next.total_value.to_string(),
                            stocks,
                            next.version as i64,
                        ),
                    )
                    .await
            }
            Some(previous) => {
                let query = Query::new("UPDATE portfolio_ledger.portfolios SET wallet = ?, investment_fund = ?, total_value = ?, stocks = ?, version = ? WHERE user_id = ? IF version = ?");
                self.session
                    .query(
                        query,
                        (
                            next.wallet.to_string(),
                            next.investment_fund.to_string(),
                            next.total_value.to_string(),
                            stocks,
                            next.version as i64,
                            next.user_id.as_str(),
                            previous.version as i64,
                        ),
                    )
                    .await
            }
        }
        .map_err(backend)?;
        Ok(was_applied(result.rows))
    }

    /// Undoes a portfolio write whose transaction row never landed.
    async fn revert_portfolio(
        &self,
        previous: Option<&Portfolio>,
        next: &Portfolio,
    ) -> Result<(), StoreError> {
        let result = match previous {
            None => {
                let query = Query::new(
                    "DELETE FROM portfolio_ledger.portfolios WHERE user_id = ? IF version = ?",
                );
                self.session
                    .query(query, (next.user_id.as_str(), next.version as i64))
                    .await
                    .map_err(backend)?
            }
            Some(previous) => {
                let query = Query::new("UPDATE portfolio_ledger.portfolios SET wallet = ?, investment_fund = ?, total_value = ?, stocks = ?, version = ? WHERE user_id = ? IF version = ?");
                self.session
                    .query(
                        query,
                        (
                            previous.wallet.to_string(),
                            previous.investment_fund.to_string(),
                            previous.total_value.to_string(),
                            encode_stocks(&previous.stocks)?,
                            previous.version as i64,
                            previous.user_id.as_str(),
                            next.version as i64,
                        ),
                    )
                    .await
                    .map_err(backend)?
            }
        };
        if !was_applied(result.rows) {
            warn!(
                "Portfolio for {} moved on before it could be reverted.",
                next.user_id
            );
        }
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let query = Query::new("INSERT INTO portfolio_ledger.transactions (user_id, created_at, id, symbol, kind, quantity, price, profit_or_loss) VALUES (?, ?, ?, ?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    transaction.user_id.as_str(),
                    transaction.created_at.timestamp_millis(),
                    transaction.id.as_str(),
                    transaction.symbol.as_str(),
                    transaction.kind.as_str(),
                    transaction.quantity as i64,
                    transaction.price.to_string(),
                    transaction.profit_or_loss.map(|p| p.to_string()),
                ),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl Store for ScyllaStore {
    async fn load_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, StoreError> {
        let query = Query::new(format!(
            "SELECT {} FROM portfolio_ledger.portfolios WHERE user_id = ?",
            PORTFOLIO_COLUMNS
        ));
        let result = self
            .session
            .query(query, (user_id,))
            .await
            .map_err(backend)?;
        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => portfolio_from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn scan_portfolios(&self) -> Result<Vec<Portfolio>, StoreError> {
        let query = Query::new(format!(
            "SELECT {} FROM portfolio_ledger.portfolios",
            PORTFOLIO_COLUMNS
        ));
        let result = self.session.query(query, &[]).await.map_err(backend)?;
        let portfolios = result
            .rows
            .unwrap_or_default()
            .iter()
            .filter_map(|row| match portfolio_from_row(row) {
                Ok(portfolio) => Some(portfolio),
                Err(e) => {
                    error!("Skipping unreadable portfolio row: {}", e);
                    None
                }
            })
            .collect();
        Ok(portfolios)
    }

    async fn commit_trade(
        &self,
        previous: Option<&Portfolio>,
        next: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        if !self.swap_portfolio(previous, next).await? {
            return Err(StoreError::Conflict);
        }
        if let Err(e) = self.insert_transaction(transaction).await {
            error!(
                "Failed to record transaction {} for {}: {}. Reverting portfolio.",
                transaction.id, transaction.user_id, e
            );
            let reverted = self.revert_portfolio(previous, next).await;
            return Err(insert_failure(e, reverted, next));
        }
        Ok(())
    }

    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let query = Query::new("SELECT user_id, created_at, id, symbol, kind, quantity, price, profit_or_loss FROM portfolio_ledger.transactions WHERE user_id = ?");
        let result = self
            .session
            .query(query, (user_id,))
            .await
            .map_err(backend)?;
        result
            .rows
            .unwrap_or_default()
            .iter()
            .map(transaction_from_row)
            .collect()
    }

    async fn load_watchlist(&self, user_id: &str) -> Result<Option<Watchlist>, StoreError> {
        let query = Query::new("SELECT symbols FROM portfolio_ledger.watchlists WHERE user_id = ?");
        let result = self
            .session
            .query(query, (user_id,))
            .await
            .map_err(backend)?;
        match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => {
                let symbols: Vec<String> = serde_json::from_str(&text_column(&row, 0, "symbols")?)
                    .map_err(|_| corrupt("symbols"))?;
                let user_id = UserId::parse(user_id).map_err(|_| corrupt("user_id"))?;
                Ok(Some(Watchlist { user_id, symbols }))
            }
            None => Ok(None),
        }
    }

    async fn save_watchlist(&self, watchlist: &Watchlist) -> Result<(), StoreError> {
        let symbols = serde_json::to_string(&watchlist.symbols).map_err(backend)?;
        let query =
            Query::new("INSERT INTO portfolio_ledger.watchlists (user_id, symbols) VALUES (?, ?)");
        self.session
            .query(query, (watchlist.user_id.as_str(), symbols))
            .await
            .map_err(backend)?;
        Ok(())
    }
}
