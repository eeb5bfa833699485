// src/api.rs
use crate::error::{handle_rejection, ApiError};
use crate::ledger::Ledger;
use crate::models::{ProfitLossSummary, TransactionRequest, WatchlistRequest};
use crate::watchlist::Watchlists;
use log::{error, info, warn};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub fn routes(
    ledger: Arc<Ledger>,
    watchlists: Arc<Watchlists>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "ok": true, "service": "portfolio_ledger" })));

    let record = warp::path!("transaction")
        .and(warp::post())
        .and(with_ledger(ledger.clone()))
        .and(warp::body::json())
        .and_then(record_transaction_handler);

    let history = warp::path!("transactions" / String)
        .and(warp::get())
        .and(with_ledger(ledger.clone()))
        .and_then(transaction_history_handler);

    let profit_loss = warp::path!("transactions" / String / "profit-loss")
        .and(warp::get())
        .and(with_ledger(ledger.clone()))
        .and_then(profit_loss_handler);

    let portfolio = warp::path!("portfolio" / String)
        .and(warp::get())
        .and(with_ledger(ledger))
        .and_then(get_portfolio_handler);

    let get_watchlist = warp::path!("watchlist" / String)
        .and(warp::get())
        .and(with_watchlists(watchlists.clone()))
        .and_then(get_watchlist_handler);

    let add_symbol = warp::path!("watchlist" / "add")
        .and(warp::post())
        .and(with_watchlists(watchlists.clone()))
        .and(warp::body::json())
        .and_then(add_symbol_handler);

    let remove_symbol = warp::path!("watchlist" / "remove")
        .and(warp::post())
        .and(with_watchlists(watchlists))
        .and(warp::body::json())
        .and_then(remove_symbol_handler);

    health
        .or(record)
        .or(history)
        .or(profit_loss)
        .or(portfolio)
        .or(get_watchlist)
        .or(add_symbol)
        .or(remove_symbol)
        .recover(handle_rejection)
}

fn with_ledger(
    ledger: Arc<Ledger>,
) -> impl Filter<Extract = (Arc<Ledger>,), Error = Infallible> + Clone {
    warp::any().map(move || ledger.clone())
}

fn with_watchlists(
    watchlists: Arc<Watchlists>,
) -> impl Filter<Extract = (Arc<Watchlists>,), Error = Infallible> + Clone {
    warp::any().map(move || watchlists.clone())
}

fn reject(err: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(err.into())
}

async fn record_transaction_handler(
    ledger: Arc<Ledger>,
    request: TransactionRequest,
) -> Result<impl Reply, Rejection> {
    match ledger.record_transaction(request).await {
        Ok(transaction) => {
            info!("Transaction {} recorded.", transaction.id);
            Ok(warp::reply::with_status(
                warp::reply::json(&transaction),
                StatusCode::CREATED,
            ))
        }
        Err(e) => {
            warn!("Transaction rejected: {}", e);
            Err(reject(e))
        }
    }
}

async fn transaction_history_handler(
    user_id: String,
    ledger: Arc<Ledger>,
) -> Result<impl Reply, Rejection> {
    match ledger.transaction_history(&user_id).await {
        Ok(history) => {
            info!("Returned {} transactions for {}.", history.len(), user_id);
            Ok(warp::reply::json(&history))
        }
        Err(e) => {
            error!("Failed to load transactions for {}: {}", user_id, e);
            Err(reject(e))
        }
    }
}

async fn profit_loss_handler(
    user_id: String,
    ledger: Arc<Ledger>,
) -> Result<impl Reply, Rejection> {
    match ledger.total_profit_or_loss(&user_id).await {
        Ok(total) => {
            info!("Total profit/loss for {} is {}.", user_id, total);
            Ok(warp::reply::json(&ProfitLossSummary {
                total_profit_or_loss: total,
            }))
        }
        Err(e) => {
            error!("Failed to total profit/loss for {}: {}", user_id, e);
            Err(reject(e))
        }
    }
}

async fn get_portfolio_handler(
    user_id: String,
    ledger: Arc<Ledger>,
) -> Result<impl Reply, Rejection> {
    match ledger.portfolio(&user_id).await {
        Ok(portfolio) => {
            info!("Portfolio retrieved for {}.", portfolio.user_id);
            Ok(warp::reply::json(&portfolio))
        }
        Err(e) => {
            error!("Failed to retrieve portfolio for {}: {}", user_id, e);
            Err(reject(e))
        }
    }
}

async fn get_watchlist_handler(
    user_id: String,
    watchlists: Arc<Watchlists>,
) -> Result<impl Reply, Rejection> {
    match watchlists.get(&user_id).await {
        Ok(list) => {
            info!("Watchlist retrieved for {}.", user_id);
            Ok(warp::reply::json(&list))
        }
        Err(e) => {
            error!("Failed to retrieve watchlist for {}: {}", user_id, e);
            Err(reject(e))
        }
    }
}

async fn add_symbol_handler(
    watchlists: Arc<Watchlists>,
    request: WatchlistRequest,
) -> Result<impl Reply, Rejection> {
    match watchlists.add_symbol(request).await {
        Ok(list) => {
            info!("Symbol added to watchlist for {}.", list.user_id);
            Ok(warp::reply::json(&list))
        }
        Err(e) => {
            error!("Failed to add to watchlist: {}", e);
            Err(reject(e))
        }
    }
}

async fn remove_symbol_handler(
    watchlists: Arc<Watchlists>,
    request: WatchlistRequest,
) -> Result<impl Reply, Rejection> {
    match watchlists.remove_symbol(request).await {
        Ok(list) => {
            info!("Symbol removed from watchlist for {}.", list.user_id);
            Ok(warp::reply::json(&list))
        }
        Err(e) => {
            error!("Failed to remove from watchlist: {}", e);
            Err(reject(e))
        }
    }
}
