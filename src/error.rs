//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::transaction::TransactionId;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A create request did not supply one of the required fields.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The transaction ID in the request path is not a well-formed ID.
    ///
    /// This is distinct from [Error::NotFound]: the ID could never refer to a
    /// transaction, so the client should fix the request rather than retry.
    #[error("\"{0}\" is not a valid transaction ID")]
    InvalidTransactionId(String),

    /// A quantity or points bound could not be parsed as a decimal number.
    #[error("could not parse \"{0}\" as a decimal number")]
    InvalidNumber(String),

    /// A negative quantity was supplied for a transaction.
    #[error("quantity must not be negative, got {0}")]
    NegativeQuantity(f64),

    /// A date range filter could not be parsed.
    #[error("could not parse the date range \"{0}\", expected \"YYYY-MM-DD to YYYY-MM-DD\"")]
    InvalidDateRange(String),

    /// There was an error formatting a creation timestamp for storage.
    #[error("could not format the creation timestamp: {0}")]
    InvalidDateFormat(String),

    /// The requested transaction was not found.
    ///
    /// The client should check that the ID is correct and that the
    /// transaction has not been deleted.
    #[error("the transaction could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A transaction record was written but the matching balance adjustment
    /// failed, so the user's stored balance no longer equals the sum of their
    /// transactions' points.
    ///
    /// Callers must not treat this as a total failure: the transaction write
    /// has committed. The divergence is surfaced here so that reconciliation
    /// tooling can repair the balance.
    #[error(
        "transaction {transaction_id} was written but the points balance for user \
        \"{username}\" was not adjusted by {delta}; the stored balance may no longer \
        equal the sum of the user's transaction points: {source}"
    )]
    BalanceNotAdjusted {
        /// The transaction whose write committed.
        transaction_id: TransactionId,
        /// The user whose balance is now suspect.
        username: String,
        /// The points delta that was not applied.
        delta: f64,
        /// The store error that aborted the balance adjustment.
        source: rusqlite::Error,
    },
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match self {
            Error::MissingField(_)
            | Error::InvalidTransactionId(_)
            | Error::InvalidNumber(_)
            | Error::NegativeQuantity(_)
            | Error::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_)
            | Error::InvalidDateFormat(_)
            | Error::BalanceNotAdjusted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
        }

        (
            status_code,
            Json(json!({ "success": false, "message": self.to_string() })),
        )
            .into_response()
    }
}
