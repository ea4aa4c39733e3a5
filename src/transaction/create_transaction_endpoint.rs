//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    points::RateTable,
    transaction::lifecycle::{CreateTransactionRequest, create_with_points},
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The rate table for computing the new transaction's points.
    pub rate_table: RateTable,
    /// The timezone for the creation timestamp.
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            rate_table: state.rate_table.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The JSON body for creating a transaction.
///
/// Every field is optional so that a missing one produces a
/// [Error::MissingField] naming the field rather than a generic
/// deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionBody {
    /// The submitting user.
    pub username: Option<String>,
    /// The waste category.
    #[serde(rename = "wasteType")]
    pub waste_type: Option<String>,
    /// The waste quantity in kilograms, as a number or numeric string.
    pub quantity: Option<serde_json::Value>,
    /// The collection center.
    pub center: Option<String>,
}

/// The JSON response for a successful create.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    /// Always true on this path.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
    /// The new transaction's opaque ID.
    pub transaction_id: String,
}

/// A route handler for creating a new transaction and crediting the owner's
/// points balance.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Json(body): Json<CreateTransactionBody>,
) -> Result<Json<CreateTransactionResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction_id = create_with_points(
        CreateTransactionRequest {
            username: body.username,
            waste_type: body.waste_type,
            quantity: body.quantity,
            center: body.center,
        },
        &state.rate_table,
        &state.local_timezone,
        &connection,
    )?;

    Ok(Json(CreateTransactionResponse {
        success: true,
        message: "Transaction created successfully".to_owned(),
        transaction_id: transaction_id.to_string(),
    }))
}
