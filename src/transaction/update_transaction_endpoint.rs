//! Defines the endpoint for applying a partial update to a transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    points::RateTable,
    transaction::core::parse_transaction_id,
    transaction::lifecycle::{TransactionPatch, UpdateOutcome, update_with_points},
};

/// The state needed to update a transaction.
#[derive(Debug, Clone)]
pub struct UpdateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The rate table for recomputing points.
    pub rate_table: RateTable,
}

impl FromRef<AppState> for UpdateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            rate_table: state.rate_table.clone(),
        }
    }
}

/// The JSON body for updating a transaction. Any subset of fields may be
/// supplied; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTransactionBody {
    /// New owner username.
    pub username: Option<String>,
    /// New waste category.
    #[serde(rename = "wasteType")]
    pub waste_type: Option<String>,
    /// New quantity, as a number or numeric string.
    pub quantity: Option<serde_json::Value>,
    /// New collection center.
    pub center: Option<String>,
    /// New lifecycle tag.
    pub status: Option<String>,
}

/// The JSON response for a successful update.
#[derive(Debug, Serialize)]
pub struct UpdateTransactionResponse {
    /// Always true on this path.
    pub success: bool,
    /// States whether the transaction changed or the call was a no-op.
    pub message: String,
}

/// A route handler for updating a transaction while keeping its points and
/// the owner's balance synchronized.
pub async fn update_transaction_endpoint(
    State(state): State<UpdateTransactionState>,
    Path(transaction_id): Path<String>,
    Json(body): Json<UpdateTransactionBody>,
) -> Result<Json<UpdateTransactionResponse>, Error> {
    let id = parse_transaction_id(&transaction_id)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let outcome = update_with_points(
        id,
        TransactionPatch {
            username: body.username,
            waste_type: body.waste_type,
            quantity: body.quantity,
            center: body.center,
            status: body.status,
        },
        &state.rate_table,
        &connection,
    )?;

    let message = match outcome {
        UpdateOutcome::Updated => "Transaction updated successfully",
        UpdateOutcome::NoChanges => "No changes made to the transaction",
    };

    Ok(Json(UpdateTransactionResponse {
        success: true,
        message: message.to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json,
        extract::{Path, State},
    };
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        Error,
        db::initialize,
        points::RateTable,
        transaction::core::get_transaction,
        transaction::lifecycle::{CreateTransactionRequest, create_with_points},
        user::{create_user, get_user_points},
    };

    use super::{UpdateTransactionBody, UpdateTransactionState, update_transaction_endpoint};

    fn get_test_state_with_transaction() -> UpdateTransactionState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("alice", &conn).unwrap();
        create_with_points(
            CreateTransactionRequest {
                username: Some("alice".to_owned()),
                waste_type: Some("plastic".to_owned()),
                quantity: Some(json!(2)),
                center: Some("C1".to_owned()),
            },
            &RateTable::default(),
            "Asia/Kolkata",
            &conn,
        )
        .unwrap();

        UpdateTransactionState {
            db_connection: Arc::new(Mutex::new(conn)),
            rate_table: RateTable::default(),
        }
    }

    #[tokio::test]
    async fn can_update_transaction() {
        let state = get_test_state_with_transaction();

        let response = update_transaction_endpoint(
            State(state.clone()),
            Path("1".to_owned()),
            Json(UpdateTransactionBody {
                quantity: Some(json!(3)),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.message, "Transaction updated successfully");

        let connection = state.db_connection.lock().unwrap();
        assert_eq!(get_transaction(1, &connection).unwrap().points, 33.0);
        assert_eq!(get_user_points("alice", &connection), Ok(33.0));
    }

    #[tokio::test]
    async fn empty_body_reports_a_no_op() {
        let state = get_test_state_with_transaction();

        let response = update_transaction_endpoint(
            State(state),
            Path("1".to_owned()),
            Json(UpdateTransactionBody::default()),
        )
        .await
        .unwrap();

        assert_eq!(response.message, "No changes made to the transaction");
    }

    #[tokio::test]
    async fn malformed_id_is_a_validation_error() {
        let state = get_test_state_with_transaction();

        let result = update_transaction_endpoint(
            State(state),
            Path("None".to_owned()),
            Json(UpdateTransactionBody::default()),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidTransactionId(_))));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let state = get_test_state_with_transaction();

        let result = update_transaction_endpoint(
            State(state),
            Path("99".to_owned()),
            Json(UpdateTransactionBody {
                status: Some("approved".to_owned()),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
