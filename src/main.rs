// src/main.rs
use env_logger::Builder;
use log::{error, info};
use portfolio_ledger::api;
use portfolio_ledger::config::{Settings, StorageBackend};
use portfolio_ledger::ledger::Ledger;
use portfolio_ledger::store::{MemoryStore, ScyllaStore, Store};
use portfolio_ledger::watchlist::Watchlists;
use std::sync::Arc;
use warp::Filter;

async fn open_store(settings: &Settings) -> Option<Arc<dyn Store>> {
    match settings.storage {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart.");
            Some(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Scylla => match ScyllaStore::connect(&settings.scylla_node).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                None
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    Builder::new()
        .parse_filters(&settings.log_level)
        .format_timestamp_secs()
        .init();

    info!("Starting the portfolio ledger...");
    let store = match open_store(&settings).await {
        Some(store) => store,
        None => return,
    };

    let ledger = Arc::new(Ledger::new(
        store.clone(),
        settings.initial_wallet,
        settings.max_commit_retries,
    ));
    let watchlists = Arc::new(Watchlists::new(store));

    let api = api::routes(ledger, watchlists).with(warp::log("portfolio_ledger::http"));

    info!("Server running on http://{}", settings.bind_addr);
    warp::serve(api).run(settings.bind_addr).await;
}
