// src/watchlist.rs
use crate::error::LedgerError;
use crate::locks::UserLocks;
use crate::models::{normalize_symbol, UserId, Watchlist, WatchlistRequest};
use crate::store::Store;
use log::{debug, info};
use std::sync::Arc;

/// Per-user symbol lists. Every mutation creates the list on demand, so add
/// and remove are both idempotent and order independent.
pub struct Watchlists {
    store: Arc<dyn Store>,
    locks: UserLocks,
}

impl Watchlists {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Watchlists {
            store,
            locks: UserLocks::new(),
        }
    }

    /// An absent watchlist reads as empty.
    pub async fn get(&self, user_id: &str) -> Result<Watchlist, LedgerError> {
        let user_id = UserId::parse(user_id)?;
        let stored = self.store.load_watchlist(user_id.as_str()).await?;
        Ok(stored.unwrap_or_else(|| Watchlist::new(user_id)))
    }

    pub async fn add_symbol(&self, request: WatchlistRequest) -> Result<Watchlist, LedgerError> {
        self.update(request, |list, symbol| list.add(symbol)).await
    }

    pub async fn remove_symbol(
        &self,
        request: WatchlistRequest,
    ) -> Result<Watchlist, LedgerError> {
        self.update(request, |list, symbol| list.remove(symbol)).await
    }

    async fn update<F>(
        &self,
        request: WatchlistRequest,
        change: F,
    ) -> Result<Watchlist, LedgerError>
    where
        F: FnOnce(&mut Watchlist, &str) -> bool,
    {
        let user_id = UserId::parse(&request.user_id)?;
        let symbol = normalize_symbol(&request.symbol)?;
        let _guard = self.locks.acquire(&user_id).await;

        let mut list = self
            .store
            .load_watchlist(user_id.as_str())
            .await?
            .unwrap_or_else(|| Watchlist::new(user_id.clone()));
        if change(&mut list, &symbol) {
            self.store.save_watchlist(&list).await?;
            info!("Watchlist for {} now {:?}", user_id, list.symbols);
        } else {
            debug!("Watchlist for {} unchanged by {}", user_id, symbol);
        }
        Ok(list)
    }
}
