//! Defines the endpoint for searching transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};

use crate::{
    AppState, Error,
    timezone::get_local_offset,
    transaction::core::Transaction,
    transaction::query::{
        SearchQuery, TransactionFilter, TransactionStats, search_transactions,
    },
};

/// The default page number when none is given.
const DEFAULT_PAGE: u64 = 1;
/// The default page size when none is given.
const DEFAULT_LIMIT: u64 = 10;

/// The state needed to search transactions.
#[derive(Debug, Clone)]
pub struct SearchTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone anchoring date-range filters to local days.
    pub local_timezone: String,
}

impl FromRef<AppState> for SearchTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query string parameters for a search.
///
/// Everything arrives as text so that empty parameters, which HTML forms
/// send for untouched inputs, can be treated as absent.
#[derive(Debug, Default, Deserialize)]
pub struct SearchTransactionsParams {
    /// Case-insensitive substring match on the username.
    pub username: Option<String>,
    /// Exact match on the waste category.
    #[serde(rename = "wasteType")]
    pub waste_type: Option<String>,
    /// Exact match on the collection center.
    pub center: Option<String>,
    /// An inclusive date range, formatted "YYYY-MM-DD to YYYY-MM-DD".
    #[serde(rename = "dateRange")]
    pub date_range: Option<String>,
    /// The minimum points per transaction.
    #[serde(rename = "minPoints")]
    pub min_points: Option<String>,
    /// The maximum points per transaction.
    #[serde(rename = "maxPoints")]
    pub max_points: Option<String>,
    /// The 1-based page number.
    pub page: Option<String>,
    /// The maximum number of transactions per page.
    pub limit: Option<String>,
}

/// The JSON response for a search.
#[derive(Debug, Serialize)]
pub struct SearchTransactionsResponse {
    /// Always true on this path.
    pub success: bool,
    /// The page's transactions, most recent first.
    pub transactions: Vec<Transaction>,
    /// Count of all transactions matching the filter.
    pub total: u64,
    /// Statistics over the page and the filtered set.
    pub stats: TransactionStats,
}

/// A route handler for the filtered, paginated transaction search.
pub async fn search_transactions_endpoint(
    State(state): State<SearchTransactionsState>,
    Query(params): Query<SearchTransactionsParams>,
) -> Result<Json<SearchTransactionsResponse>, Error> {
    let query = parse_search_query(params)?;

    let offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let results = search_transactions(&query, offset, &connection)?;

    Ok(Json(SearchTransactionsResponse {
        success: true,
        transactions: results.transactions,
        total: results.total,
        stats: results.stats,
    }))
}

/// Convert the raw query string parameters into a [SearchQuery].
fn parse_search_query(params: SearchTransactionsParams) -> Result<SearchQuery, Error> {
    let filter = TransactionFilter {
        username: non_empty(params.username),
        waste_type: non_empty(params.waste_type),
        center: non_empty(params.center),
        date_range: match non_empty(params.date_range) {
            Some(text) => parse_date_range(&text)?,
            None => None,
        },
        min_points: non_empty(params.min_points)
            .map(|text| parse_number(&text))
            .transpose()?,
        max_points: non_empty(params.max_points)
            .map(|text| parse_number(&text))
            .transpose()?,
    };

    let page = match non_empty(params.page) {
        Some(text) => parse_positive_integer(&text)?,
        None => DEFAULT_PAGE,
    };
    let limit = match non_empty(params.limit) {
        Some(text) => parse_positive_integer(&text)?,
        None => DEFAULT_LIMIT,
    };

    Ok(SearchQuery {
        filter,
        page,
        limit,
    })
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

fn parse_number(text: &str) -> Result<f64, Error> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidNumber(text.to_owned()))
}

fn parse_positive_integer(text: &str) -> Result<u64, Error> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidNumber(text.to_owned()))
}

/// Parse a "YYYY-MM-DD to YYYY-MM-DD" range.
///
/// A value missing the second bound is ignored rather than rejected, while
/// a present-but-malformed date is a validation error.
fn parse_date_range(text: &str) -> Result<Option<(Date, Date)>, Error> {
    let format = format_description!("[year]-[month]-[day]");

    let Some((start_text, end_text)) = text.split_once(" to ") else {
        return Ok(None);
    };

    let start = Date::parse(start_text.trim(), format)
        .map_err(|_| Error::InvalidDateRange(text.to_owned()))?;
    let end = Date::parse(end_text.trim(), format)
        .map_err(|_| Error::InvalidDateRange(text.to_owned()))?;

    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use rusqlite::Connection;
    use serde_json::json;
    use time::macros::date;

    use crate::{
        Error,
        db::initialize,
        points::RateTable,
        transaction::lifecycle::{CreateTransactionRequest, create_with_points},
        transaction::query::ALL_CENTERS,
        user::create_user,
    };

    use super::{
        SearchTransactionsParams, SearchTransactionsState, parse_date_range, parse_search_query,
        search_transactions_endpoint,
    };

    fn get_test_state() -> SearchTransactionsState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for (username, waste_type, quantity, center) in [
            ("alice", "plastic", 2, "C1"),
            ("bob", "paper", 1, "C2"),
            ("alice", "organic", 4, "C1"),
        ] {
            create_user(username, &conn).ok();
            create_with_points(
                CreateTransactionRequest {
                    username: Some(username.to_owned()),
                    waste_type: Some(waste_type.to_owned()),
                    quantity: Some(json!(quantity)),
                    center: Some(center.to_owned()),
                },
                &RateTable::default(),
                "Asia/Kolkata",
                &conn,
            )
            .unwrap();
        }

        SearchTransactionsState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Asia/Kolkata".to_owned(),
        }
    }

    #[tokio::test]
    async fn search_returns_all_transactions_by_default() {
        let state = get_test_state();

        let response = search_transactions_endpoint(
            State(state),
            Query(SearchTransactionsParams::default()),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.total, 3);
        assert_eq!(response.transactions.len(), 3);
        assert_eq!(response.stats.center_name, ALL_CENTERS);
    }

    #[tokio::test]
    async fn search_filters_by_center() {
        let state = get_test_state();

        let response = search_transactions_endpoint(
            State(state),
            Query(SearchTransactionsParams {
                center: Some("C1".to_owned()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 2);
        assert_eq!(response.stats.center_name, "C1");
    }

    #[tokio::test]
    async fn malformed_min_points_is_a_validation_error() {
        let state = get_test_state();

        let result = search_transactions_endpoint(
            State(state),
            Query(SearchTransactionsParams {
                min_points: Some("lots".to_owned()),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidNumber(_))));
    }

    #[test]
    fn empty_parameters_are_treated_as_absent() {
        let query = parse_search_query(SearchTransactionsParams {
            username: Some("".to_owned()),
            min_points: Some("  ".to_owned()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(query.filter.username, None);
        assert_eq!(query.filter.min_points, None);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn parses_well_formed_date_range() {
        assert_eq!(
            parse_date_range("2025-01-01 to 2025-01-31"),
            Ok(Some((date!(2025 - 01 - 01), date!(2025 - 01 - 31))))
        );
    }

    #[test]
    fn date_range_with_a_single_bound_is_ignored() {
        assert_eq!(parse_date_range("2025-01-01"), Ok(None));
    }

    #[test]
    fn malformed_date_in_range_is_a_validation_error() {
        assert_eq!(
            parse_date_range("2025-01-01 to someday"),
            Err(Error::InvalidDateRange("2025-01-01 to someday".to_owned()))
        );
    }
}
