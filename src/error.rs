// src/error.rs
use log::error;
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, Reject};
use warp::{Rejection, Reply};

/// Failures raised by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The stored portfolio changed since it was loaded.
    #[error("portfolio version conflict")]
    Conflict,

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("stored record could not be decoded: {0}")]
    Corrupt(String),
}

/// Everything the ledger and watchlist operations can fail with.
///
/// The display text of the client-facing variants is exactly what the HTTP
/// layer sends back in `{"error": ...}`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid userId format")]
    InvalidUserId,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Insufficient funds in wallet")]
    InsufficientFunds,

    #[error("Cannot sell stock not in portfolio")]
    NoSuchPosition,

    #[error("Not enough quantity to sell")]
    InsufficientQuantity,

    #[error("Portfolio not found")]
    NotFound,

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    pub fn out_of_range() -> Self {
        LedgerError::InvalidInput("amount out of range".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::NotFound => StatusCode::NOT_FOUND,
            LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to hand to a client. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::Persistence(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Reject for ApiError {}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError {
            status: err.status(),
            message: err.public_message(),
        }
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = err.find::<ApiError>() {
        (api.status, api.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}
