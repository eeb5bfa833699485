// src/models.rs
use crate::error::LedgerError;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of a document-style user identifier (12 bytes, hex encoded).
pub const USER_ID_LEN: usize = 24;

/// A validated user identifier, stored in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        if trimmed.len() == USER_ID_LEN && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(UserId(trimmed.to_ascii_lowercase()))
        } else {
            Err(LedgerError::InvalidUserId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Loose comparison used when an exact key lookup misses.
    pub fn matches_loosely(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uppercases a ticker and rejects blanks.
pub fn normalize_symbol(raw: &str) -> Result<String, LedgerError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::InvalidInput(
            "symbol must not be empty".to_string(),
        ));
    }
    Ok(symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(LedgerError::InvalidTransactionType(other.to_string())),
        }
    }
}

/// One held symbol. `invested_amount` tracks `quantity * average_price`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub average_price: Decimal,
    pub invested_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub user_id: UserId,
    pub wallet: Decimal,
    pub investment_fund: Decimal,
    pub stocks: Vec<Position>,
    pub total_value: Decimal,
    /// Bumped on every committed trade; used for optimistic concurrency.
    #[serde(skip)]
    pub version: u64,
}

impl Portfolio {
    /// A fresh, never persisted portfolio.
    pub fn new(user_id: UserId, wallet: Decimal) -> Self {
        Portfolio {
            user_id,
            wallet,
            investment_fund: Decimal::ZERO,
            stocks: Vec::new(),
            total_value: Decimal::ZERO,
            version: 0,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.stocks.iter().find(|p| p.symbol == symbol)
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    /// Sum of the invested amounts of all open positions.
    pub fn deployed_capital(&self) -> Decimal {
        self.stocks.iter().map(|p| p.invested_amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: UserId,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: TradeType,
    pub quantity: u64,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_or_loss: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Timestamps are kept to the millisecond, the precision the stores
    /// persist, so a recorded transaction reads back unchanged.
    pub fn record(order: &TradeOrder, profit_or_loss: Option<Decimal>) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            user_id: order.user_id.clone(),
            symbol: order.symbol.clone(),
            kind: order.kind,
            quantity: order.quantity,
            price: order.price,
            profit_or_loss,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Watchlist {
    pub user_id: UserId,
    pub symbols: Vec<String>,
}

impl Watchlist {
    pub fn new(user_id: UserId) -> Self {
        Watchlist {
            user_id,
            symbols: Vec::new(),
        }
    }

    /// Returns false when the symbol was already listed.
    pub fn add(&mut self, symbol: &str) -> bool {
        if self.symbols.iter().any(|s| s == symbol) {
            return false;
        }
        self.symbols.push(symbol.to_string());
        true
    }

    /// Returns false when the symbol was not listed.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s != symbol);
        self.symbols.len() != before
    }
}

/// Body of `POST /transaction` as it arrives on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub user_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
    pub price: Decimal,
}

/// A trade instruction that passed every input check.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub user_id: UserId,
    pub symbol: String,
    pub kind: TradeType,
    pub quantity: u64,
    pub price: Decimal,
}

impl TryFrom<TransactionRequest> for TradeOrder {
    type Error = LedgerError;

    fn try_from(request: TransactionRequest) -> Result<Self, Self::Error> {
        let user_id = UserId::parse(&request.user_id)?;
        let kind = request.kind.parse::<TradeType>()?;
        let symbol = normalize_symbol(&request.symbol)?;
        if request.quantity <= 0 {
            return Err(LedgerError::InvalidInput(
                "quantity must be a positive integer".to_string(),
            ));
        }
        if request.price <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }
        Ok(TradeOrder {
            user_id,
            symbol,
            kind,
            quantity: request.quantity as u64,
            price: request.price,
        })
    }
}

/// Body of `POST /watchlist/add` and `POST /watchlist/remove`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistRequest {
    pub user_id: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitLossSummary {
    pub total_profit_or_loss: Decimal,
}
