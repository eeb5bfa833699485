//! In-process tests for the HTTP surface.
//!
//! Each test builds the warp filter tree over a fresh `MemoryStore` and drives
//! it with `warp::test::request()`; no socket is bound.

use portfolio_ledger::api;
use portfolio_ledger::ledger::Ledger;
use portfolio_ledger::store::MemoryStore;
use portfolio_ledger::watchlist::Watchlists;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Reply};

const USER: &str = "64b7f0c2a1d3e4f5a6b7c8d9";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app() -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(Ledger::new(store.clone(), dec!(25000), 3));
    let watchlists = Arc::new(Watchlists::new(store));
    api::routes(ledger, watchlists)
}

async fn call<F>(app: &F, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value)
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let mut req = warp::test::request().method(method).path(path);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.reply(app).await;
    let status = resp.status();
    let json = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
    (status, json)
}

async fn get<F>(app: &F, path: &str) -> (StatusCode, Value)
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    call(app, "GET", path, None).await
}

async fn post<F>(app: &F, path: &str, body: Value) -> (StatusCode, Value)
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    call(app, "POST", path, Some(body)).await
}

fn trade(kind: &str, symbol: &str, quantity: i64, price: f64) -> Value {
    json!({
        "userId": USER,
        "symbol": symbol,
        "type": kind,
        "quantity": quantity,
        "price": price,
    })
}

// ---------------------------------------------------------------------------
// POST /transaction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn buy_returns_created_transaction() {
    let app = app();
    let (status, body) = post(&app, "/transaction", trade("BUY", "aapl", 10, 150.0)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["type"], "BUY");
    assert_eq!(body["quantity"], 10);
    assert_eq!(body["price"], 150.0);
    assert_eq!(body["userId"], USER);
    assert!(body.get("profitOrLoss").is_none());
    assert!(body["id"].is_string());
}

#[tokio::test]
async fn business_rule_violations_are_400_with_message() {
    let app = app();
    let (status, body) = post(&app, "/transaction", trade("SELL", "TSLA", 1, 100.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot sell stock not in portfolio");

    let (status, body) = post(&app, "/transaction", trade("BUY", "AAPL", 100, 10000.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient funds in wallet");

    post(&app, "/transaction", trade("BUY", "AAPL", 2, 10.0)).await;
    let (status, body) = post(&app, "/transaction", trade("SELL", "AAPL", 3, 10.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not enough quantity to sell");
}

#[tokio::test]
async fn malformed_requests_are_400() {
    let app = app();
    let mut bad_id = trade("BUY", "AAPL", 1, 1.0);
    bad_id["userId"] = json!("abc");
    let (status, body) = post(&app, "/transaction", bad_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid userId format");

    let (status, body) = post(&app, "/transaction", trade("HOLD", "AAPL", 1, 1.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid transaction type: HOLD");

    let (status, _) = post(&app, "/transaction", trade("BUY", "AAPL", 0, 1.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/transaction", trade("BUY", "AAPL", 1, -1.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(&app, "/transaction", json!({ "userId": USER })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    // nothing above may have opened a portfolio
    let (status, _) = get(&app, &format!("/portfolio/{}", USER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// GET /portfolio, /transactions, /transactions/:id/profit-loss
// ---------------------------------------------------------------------------

#[tokio::test]
async fn portfolio_follows_trading_scenario() {
    let app = app();
    let (status, body) = get(&app, &format!("/portfolio/{}", USER)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Portfolio not found");

    for (kind, qty, price) in [
        ("BUY", 10, 150.0),
        ("BUY", 10, 170.0),
        ("SELL", 5, 200.0),
    ] {
        let (status, _) = post(&app, "/transaction", trade(kind, "AAPL", qty, price)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = get(&app, &format!("/portfolio/{}", USER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallet"], 22800.0);
    assert_eq!(body["investmentFund"], 2400.0);
    let stocks = body["stocks"].as_array().unwrap();
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0]["symbol"], "AAPL");
    assert_eq!(stocks[0]["quantity"], 15);
    assert_eq!(stocks[0]["averagePrice"], 160.0);
    assert_eq!(stocks[0]["investedAmount"], 2400.0);

    let (status, body) = post(&app, "/transaction", trade("SELL", "AAPL", 15, 100.0)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["profitOrLoss"], -900.0);

    let (_, body) = get(&app, &format!("/portfolio/{}", USER.to_uppercase())).await;
    assert!(body["stocks"].as_array().unwrap().is_empty());
    assert_eq!(body["wallet"], 24300.0);

    let (status, body) = get(&app, &format!("/transactions/{}", USER)).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["SELL", "SELL", "BUY", "BUY"]);

    let (status, body) = get(&app, &format!("/transactions/{}/profit-loss", USER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalProfitOrLoss"], -700.0);
}

#[tokio::test]
async fn recorded_transaction_reads_back_unchanged() {
    let app = app();
    let (_, created) = post(&app, "/transaction", trade("BUY", "AMZN", 3, 127.5)).await;
    let (_, history) = get(&app, &format!("/transactions/{}", USER)).await;
    assert_eq!(history, json!([created]));
}

#[tokio::test]
async fn empty_history_and_zero_profit_for_new_user() {
    let app = app();
    let (status, body) = get(&app, &format!("/transactions/{}", USER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (_, body) = get(&app, &format!("/transactions/{}/profit-loss", USER)).await;
    assert_eq!(body["totalProfitOrLoss"], 0.0);

    let (status, _) = get(&app, "/transactions/not-a-user").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watchlist_add_remove_round() {
    let app = app();
    let (status, body) = get(&app, &format!("/watchlist/{}", USER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbols"], json!([]));

    let (status, body) = post(
        &app,
        "/watchlist/remove",
        json!({ "userId": USER, "symbol": "AAPL" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbols"], json!([]));

    for symbol in ["nvda", "AAPL", "NVDA"] {
        let (status, _) = post(
            &app,
            "/watchlist/add",
            json!({ "userId": USER, "symbol": symbol }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = get(&app, &format!("/watchlist/{}", USER)).await;
    assert_eq!(body["symbols"], json!(["NVDA", "AAPL"]));

    let (_, body) = post(
        &app,
        "/watchlist/remove",
        json!({ "userId": USER, "symbol": "NVDA" }),
    )
    .await;
    assert_eq!(body["symbols"], json!(["AAPL"]));
}

// ---------------------------------------------------------------------------
// Routing edges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = get(&app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, _) = get(&app, "/transaction").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
