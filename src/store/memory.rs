// src/store/memory.rs
use super::Store;
use crate::error::StoreError;
use crate::models::{Portfolio, Transaction, Watchlist};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    portfolios: HashMap<String, Portfolio>,
    transactions: Vec<Transaction>,
    watchlists: HashMap<String, Watchlist>,
}

/// Process-local store. All tables sit behind one lock, which makes a trade
/// commit atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, StoreError> {
        Ok(self.tables.read().await.portfolios.get(user_id).cloned())
    }

    async fn scan_portfolios(&self) -> Result<Vec<Portfolio>, StoreError> {
        Ok(self.tables.read().await.portfolios.values().cloned().collect())
    }

    async fn commit_trade(
        &self,
        previous: Option<&Portfolio>,
        next: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let key = next.user_id.as_str();
        let stored_version = tables.portfolios.get(key).map(|p| p.version);
        if stored_version != previous.map(|p| p.version) {
            return Err(StoreError::Conflict);
        }
        tables.portfolios.insert(key.to_string(), next.clone());
        tables.transactions.push(transaction.clone());
        Ok(())
    }

    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let tables = self.tables.read().await;
        let mut history: Vec<Transaction> = tables
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id.as_str() == user_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep reverse insertion order
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn load_watchlist(&self, user_id: &str) -> Result<Option<Watchlist>, StoreError> {
        Ok(self.tables.read().await.watchlists.get(user_id).cloned())
    }

    async fn save_watchlist(&self, watchlist: &Watchlist) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .watchlists
            .insert(watchlist.user_id.as_str().to_string(), watchlist.clone());
        Ok(())
    }
}
