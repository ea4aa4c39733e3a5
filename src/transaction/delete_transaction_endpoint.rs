//! Defines the endpoint for deleting a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    transaction::core::parse_transaction_id,
    transaction::lifecycle::delete_with_points,
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON response for a successful delete.
#[derive(Debug, Serialize)]
pub struct DeleteTransactionResponse {
    /// Always true on this path.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
}

/// A route handler for deleting a transaction and reversing its point
/// contribution to the owner's balance.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<DeleteTransactionResponse>, Error> {
    let id = parse_transaction_id(&transaction_id)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_with_points(id, &connection)?;

    Ok(Json(DeleteTransactionResponse {
        success: true,
        message: "Transaction deleted successfully".to_owned(),
    }))
}
