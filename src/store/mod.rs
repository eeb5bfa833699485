// src/store/mod.rs
use crate::error::StoreError;
use crate::models::{Portfolio, Transaction, Watchlist};
use async_trait::async_trait;

pub mod memory;
pub mod scylla;

pub use self::memory::MemoryStore;
pub use self::scylla::ScyllaStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Exact key lookup.
    async fn load_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, StoreError>;

    async fn scan_portfolios(&self) -> Result<Vec<Portfolio>, StoreError>;

    /// Writes `next` and appends `transaction` as one unit.
    ///
    /// The write only lands if the stored portfolio still carries
    /// `previous.version`, or is still absent when `previous` is `None`;
    /// otherwise nothing is written and `StoreError::Conflict` is returned.
    async fn commit_trade(
        &self,
        previous: Option<&Portfolio>,
        next: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), StoreError>;

    /// Newest first.
    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError>;

    async fn load_watchlist(&self, user_id: &str) -> Result<Option<Watchlist>, StoreError>;

    async fn save_watchlist(&self, watchlist: &Watchlist) -> Result<(), StoreError>;
}
