//! Assembles the API routes into the application router.

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, put},
};
use serde_json::json;

use crate::{
    AppState,
    endpoints::{TRANSACTION, TRANSACTIONS_API},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, search_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Create the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            TRANSACTIONS_API,
            get(search_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": "resource not found"})),
    )
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{AppState, points::RateTable};

    use super::build_router;

    fn new_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Asia/Kolkata",
            RateTable::default(),
        )
        .unwrap();

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn transaction_lifecycle_over_http() {
        let server = new_test_server();

        let response = server
            .post("/api/transactions")
            .json(&json!({
                "username": "alice",
                "wasteType": "plastic",
                "quantity": 2,
                "center": "C1",
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["transaction_id"], json!("1"));

        let response = server
            .put("/api/transactions/1")
            .json(&json!({"quantity": 3}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], json!("Transaction updated successfully"));

        let response = server.get("/api/transactions").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["transactions"][0]["_id"], json!("1"));
        assert_eq!(body["transactions"][0]["wasteType"], json!("plastic"));
        assert_eq!(body["transactions"][0]["points"], json!(33.0));
        assert_eq!(body["stats"]["totalTransactions"], json!(1));
        assert_eq!(body["stats"]["centerName"], json!("All Centers"));

        let response = server.delete("/api/transactions/1").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["message"], json!("Transaction deleted successfully"));

        let response = server.get("/api/transactions").await;
        let body: Value = response.json();
        assert_eq!(body["total"], json!(0));
    }

    #[tokio::test]
    async fn create_with_missing_field_is_a_bad_request() {
        let server = new_test_server();

        let response = server
            .post("/api/transactions")
            .json(&json!({
                "username": "alice",
                "wasteType": "plastic",
                "quantity": 2,
            }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("missing required field: center"));
    }

    #[tokio::test]
    async fn malformed_transaction_id_is_a_bad_request() {
        let server = new_test_server();

        let response = server
            .put("/api/transactions/None")
            .json(&json!({"status": "approved"}))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let server = new_test_server();

        let response = server.delete("/api/transactions/99").await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let server = new_test_server();

        let response = server.get("/api/unknown").await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn search_filters_through_the_query_string() {
        let server = new_test_server();

        for (username, waste_type, quantity, center) in [
            ("alice", "plastic", 2, "C1"),
            ("bob", "paper", 1, "C2"),
        ] {
            server
                .post("/api/transactions")
                .json(&json!({
                    "username": username,
                    "wasteType": waste_type,
                    "quantity": quantity,
                    "center": center,
                }))
                .await
                .assert_status_ok();
        }

        let response = server
            .get("/api/transactions")
            .add_query_param("center", "C2")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], json!(1));
        assert_eq!(body["transactions"][0]["username"], json!("bob"));
        assert_eq!(body["stats"]["centerName"], json!("C2"));
    }
}
