//! Simulated brokerage ledger.
//!
//! Users trade against a cash wallet; each symbol held carries a single
//! weighted-average cost basis, and every executed buy or sell is kept as an
//! immutable transaction record. Served over HTTP by `api::routes`.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod models;
pub mod portfolio;
pub mod store;
pub mod watchlist;
