//! Filtered, paginated search over transactions with page statistics.

use rusqlite::{Connection, ToSql};
use serde::Serialize;
use time::{Date, Time, UtcOffset};

use crate::{
    Error,
    transaction::core::{Transaction, format_timestamp, map_transaction_row},
};

/// The sentinel center name reported when no center filter is applied.
pub const ALL_CENTERS: &str = "All Centers";

/// The criteria a search combines with logical AND. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionFilter {
    /// Case-insensitive substring match on the username.
    pub username: Option<String>,
    /// Exact match on the waste category.
    pub waste_type: Option<String>,
    /// Exact match on the collection center.
    pub center: Option<String>,
    /// Include transactions created within these dates (inclusive).
    pub date_range: Option<(Date, Date)>,
    /// Include transactions worth at least this many points.
    pub min_points: Option<f64>,
    /// Include transactions worth at most this many points.
    pub max_points: Option<f64>,
}

/// Defines which transactions to fetch and which page of them to return.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The filter criteria.
    pub filter: TransactionFilter,
    /// The 1-based page number.
    pub page: u64,
    /// The maximum number of transactions per page.
    pub limit: u64,
}

/// Summary statistics for one search.
///
/// `total_quantity` and `total_points` cover only the returned page, while
/// `total_transactions` is the full filtered count. Clients depend on this
/// asymmetry.
#[derive(Debug, PartialEq, Serialize)]
pub struct TransactionStats {
    /// Sum of quantity over the page's transactions, in kilograms.
    #[serde(rename = "totalQuantity")]
    pub total_quantity: f64,
    /// Sum of points over the page's transactions.
    #[serde(rename = "totalPoints")]
    pub total_points: f64,
    /// Count of all transactions matching the filter, ignoring pagination.
    #[serde(rename = "totalTransactions")]
    pub total_transactions: u64,
    /// The center filter value, or [ALL_CENTERS] when none was applied.
    #[serde(rename = "centerName")]
    pub center_name: String,
}

/// One page of search results.
#[derive(Debug, PartialEq)]
pub struct SearchResults {
    /// The page's transactions, most recent first.
    pub transactions: Vec<Transaction>,
    /// Count of all transactions matching the filter.
    pub total: u64,
    /// Statistics over the page and the filtered set.
    pub stats: TransactionStats,
}

/// Execute a paginated search over the transaction table.
///
/// Results are ordered by `created_at` descending with the ID as a stable
/// tiebreaker, so repeated calls paginate deterministically while the data
/// is static. `offset` is the fixed civil timezone offset used to anchor
/// date-range bounds to whole local days.
///
/// # Errors
/// Returns [Error::SqlError] if a query fails.
pub fn search_transactions(
    query: &SearchQuery,
    offset: UtcOffset,
    connection: &Connection,
) -> Result<SearchResults, Error> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    let filter = &query.filter;
    if let Some(username) = &filter.username {
        clauses.push("instr(lower(username), lower(?)) > 0");
        values.push(Box::new(username.clone()));
    }
    if let Some(waste_type) = &filter.waste_type {
        clauses.push("waste_type = ?");
        values.push(Box::new(waste_type.clone()));
    }
    if let Some(center) = &filter.center {
        clauses.push("center = ?");
        values.push(Box::new(center.clone()));
    }
    if let Some((start, end)) = &filter.date_range {
        // The stored text all carries the same offset, so RFC 3339 text
        // comparison is chronological comparison.
        clauses.push("created_at >= ?");
        values.push(Box::new(format_timestamp(
            start.midnight().assume_offset(offset),
        )?));
        clauses.push("created_at <= ?");
        values.push(Box::new(format_timestamp(
            end.with_time(Time::MAX).assume_offset(offset),
        )?));
    }
    if let Some(min_points) = filter.min_points {
        clauses.push("points >= ?");
        values.push(Box::new(min_points));
    }
    if let Some(max_points) = filter.max_points {
        clauses.push("points <= ?");
        values.push(Box::new(max_points));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let value_refs: Vec<&dyn ToSql> = values.iter().map(|value| value.as_ref()).collect();

    let total: i64 = connection
        .prepare(&format!(
            "SELECT COUNT(id) FROM \"transaction\"{where_sql}"
        ))?
        .query_row(&value_refs[..], |row| row.get(0))?;
    // COUNT cannot be negative.
    let total = u64::try_from(total).unwrap_or(0);

    let page = query.page.max(1);
    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let skip = i64::try_from((page - 1).saturating_mul(query.limit)).unwrap_or(i64::MAX);

    let mut page_refs = value_refs;
    page_refs.push(&limit);
    page_refs.push(&skip);

    let transactions: Vec<Transaction> = connection
        .prepare(&format!(
            "SELECT id, username, waste_type, quantity, points, center, status, created_at, \
             original_points FROM \"transaction\"{where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?
        .query_map(&page_refs[..], map_transaction_row)?
        .map(|row_result| row_result.map_err(Error::from))
        .collect::<Result<_, _>>()?;

    let stats = TransactionStats {
        total_quantity: transactions.iter().map(|t| t.quantity).sum(),
        total_points: transactions.iter().map(|t| t.points).sum(),
        total_transactions: total,
        center_name: filter
            .center
            .clone()
            .unwrap_or_else(|| ALL_CENTERS.to_owned()),
    };

    Ok(SearchResults {
        transactions,
        total,
        stats,
    })
}
