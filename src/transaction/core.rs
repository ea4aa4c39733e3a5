//! Defines the core data model and database queries for transactions.

use rusqlite::{Connection, Row, ToSql, params};
use serde::{Serialize, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::Error;

/// Alias for the integer type used for transaction IDs.
///
/// IDs are serialized as opaque strings on the wire.
pub type TransactionId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// One waste drop-off event recorded at a collection center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction, assigned by the store on creation.
    #[serde(rename = "_id", serialize_with = "serialize_id_as_string")]
    pub id: TransactionId,
    /// The user that submitted the waste.
    pub username: String,
    /// The waste category, e.g. "plastic".
    #[serde(rename = "wasteType")]
    pub waste_type: String,
    /// The amount of waste in kilograms.
    pub quantity: f64,
    /// The reward points earned, always `rate(waste_type) * quantity` for the
    /// current field values.
    pub points: f64,
    /// The collection center the waste was dropped off at.
    pub center: String,
    /// Free-form lifecycle tag, "pending" at creation.
    pub status: String,
    /// When the transaction was recorded, in the fixed civil timezone.
    /// Immutable after creation.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Snapshot of `points` at creation time, never updated.
    pub original_points: f64,
}

fn serialize_id_as_string<S>(id: &TransactionId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(id)
}

/// The fields needed to insert a new transaction row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The user that submitted the waste.
    pub username: String,
    /// The waste category.
    pub waste_type: String,
    /// The amount of waste in kilograms.
    pub quantity: f64,
    /// The reward points earned.
    pub points: f64,
    /// The collection center.
    pub center: String,
    /// The initial lifecycle tag.
    pub status: String,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
    /// Snapshot of `points` at creation time.
    pub original_points: f64,
}

/// A partial set of field updates for a transaction row.
///
/// Only fields that are `Some` are written; everything else keeps its stored
/// value. `created_at` and `original_points` are immutable by design and so
/// have no entry here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionChanges {
    /// New owner username.
    pub username: Option<String>,
    /// New waste category.
    pub waste_type: Option<String>,
    /// New quantity in kilograms.
    pub quantity: Option<f64>,
    /// New point value, supplied by the write protocol whenever the
    /// recomputed points differ from the stored value.
    pub points: Option<f64>,
    /// New collection center.
    pub center: Option<String>,
    /// New lifecycle tag.
    pub status: Option<String>,
}

impl TransactionChanges {
    /// Whether the change set writes no fields at all.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.waste_type.is_none()
            && self.quantity.is_none()
            && self.points.is_none()
            && self.center.is_none()
            && self.status.is_none()
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                waste_type TEXT NOT NULL,
                quantity REAL NOT NULL,
                points REAL NOT NULL,
                center TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                original_points REAL NOT NULL
                )",
        (),
    )?;

    // Index used by the search endpoint's ORDER BY created_at DESC.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_created_at ON \"transaction\"(created_at);",
        (),
    )?;

    Ok(())
}

/// Insert a new transaction row.
///
/// This only writes the transaction table. Keeping the owning user's balance
/// in step with the new row is the job of
/// [crate::transaction::lifecycle::create_with_points].
///
/// # Errors
/// Returns [Error::SqlError] if the insert fails.
pub fn insert_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let created_at = format_timestamp(new_transaction.created_at)?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\"
             (username, waste_type, quantity, points, center, status, created_at, original_points)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id, username, waste_type, quantity, points, center, status, created_at, \
             original_points",
        )?
        .query_row(
            params![
                new_transaction.username,
                new_transaction.waste_type,
                new_transaction.quantity,
                new_transaction.points,
                new_transaction.center,
                new_transaction.status,
                created_at,
                new_transaction.original_points,
            ],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, username, waste_type, quantity, points, center, status, created_at, \
             original_points FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

type RowsAffected = usize;

/// Apply a partial set of field updates to a transaction row in one UPDATE.
///
/// Returns the number of rows affected; zero means no row matched `id`.
/// An empty change set affects no rows and issues no SQL.
///
/// # Errors
/// Returns [Error::SqlError] if the statement fails.
pub fn update_transaction(
    id: TransactionId,
    changes: &TransactionChanges,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    let mut assignments: Vec<&str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(username) = &changes.username {
        assignments.push("username = ?");
        values.push(username);
    }
    if let Some(waste_type) = &changes.waste_type {
        assignments.push("waste_type = ?");
        values.push(waste_type);
    }
    if let Some(quantity) = &changes.quantity {
        assignments.push("quantity = ?");
        values.push(quantity);
    }
    if let Some(points) = &changes.points {
        assignments.push("points = ?");
        values.push(points);
    }
    if let Some(center) = &changes.center {
        assignments.push("center = ?");
        values.push(center);
    }
    if let Some(status) = &changes.status {
        assignments.push("status = ?");
        values.push(status);
    }

    if assignments.is_empty() {
        return Ok(0);
    }

    values.push(&id);
    let sql = format!(
        "UPDATE \"transaction\" SET {} WHERE id = ?",
        assignments.join(", ")
    );

    connection.execute(&sql, &values[..]).map_err(Error::from)
}

/// Delete a transaction row by its `id`.
///
/// Returns the number of rows affected; zero means no row matched `id`.
///
/// # Errors
/// Returns [Error::SqlError] if the statement fails.
pub fn delete_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "DELETE FROM \"transaction\" WHERE id = :id",
            &[(":id", &id)],
        )
        .map_err(Error::from)
}

/// Parse an opaque wire ID into a [TransactionId].
///
/// # Errors
/// Returns [Error::InvalidTransactionId] if `text` is not a well-formed ID.
/// A malformed ID is a client error, not a missing transaction.
pub fn parse_transaction_id(text: &str) -> Result<TransactionId, Error> {
    text.parse()
        .map_err(|_| Error::InvalidTransactionId(text.to_owned()))
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let created_at_text: String = row.get(7)?;
    let created_at = OffsetDateTime::parse(&created_at_text, &Rfc3339).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        username: row.get(1)?,
        waste_type: row.get(2)?,
        quantity: row.get(3)?,
        points: row.get(4)?,
        center: row.get(5)?,
        status: row.get(6)?,
        created_at,
        original_points: row.get(8)?,
    })
}

/// Format a timestamp as the RFC 3339 text stored in the created_at column.
///
/// All rows carry the same fixed civil timezone offset, so the stored text
/// sorts chronologically.
pub(crate) fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, Error> {
    timestamp
        .format(&Rfc3339)
        .map_err(|error| Error::InvalidDateFormat(error.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{Error, db::initialize};

    use super::{
        NewTransaction, TransactionChanges, delete_transaction, get_transaction,
        insert_transaction, update_transaction,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn test_transaction() -> NewTransaction {
        NewTransaction {
            username: "alice".to_owned(),
            waste_type: "plastic".to_owned(),
            quantity: 2.0,
            points: 22.0,
            center: "C1".to_owned(),
            status: "pending".to_owned(),
            created_at: datetime!(2025-01-15 10:30 +5:30),
            original_points: 22.0,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = get_test_connection();

        let inserted = insert_transaction(test_transaction(), &conn).unwrap();
        let got = get_transaction(inserted.id, &conn).unwrap();

        assert_eq!(inserted, got);
        assert_eq!(got.username, "alice");
        assert_eq!(got.points, 22.0);
        assert_eq!(got.created_at, datetime!(2025-01-15 10:30 +5:30));
    }

    #[test]
    fn get_fails_on_unknown_id() {
        let conn = get_test_connection();

        let result = get_transaction(42, &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_writes_only_supplied_fields() {
        let conn = get_test_connection();
        let inserted = insert_transaction(test_transaction(), &conn).unwrap();

        let rows_affected = update_transaction(
            inserted.id,
            &TransactionChanges {
                quantity: Some(3.0),
                points: Some(33.0),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(rows_affected, 1);
        let got = get_transaction(inserted.id, &conn).unwrap();
        assert_eq!(got.quantity, 3.0);
        assert_eq!(got.points, 33.0);
        assert_eq!(got.username, inserted.username);
        assert_eq!(got.created_at, inserted.created_at);
        assert_eq!(got.original_points, inserted.original_points);
    }

    #[test]
    fn empty_update_affects_no_rows() {
        let conn = get_test_connection();
        let inserted = insert_transaction(test_transaction(), &conn).unwrap();

        let rows_affected =
            update_transaction(inserted.id, &TransactionChanges::default(), &conn).unwrap();

        assert_eq!(rows_affected, 0);
        assert_eq!(get_transaction(inserted.id, &conn).unwrap(), inserted);
    }

    #[test]
    fn delete_removes_the_row() {
        let conn = get_test_connection();
        let inserted = insert_transaction(test_transaction(), &conn).unwrap();

        let rows_affected = delete_transaction(inserted.id, &conn).unwrap();

        assert_eq!(rows_affected, 1);
        assert_eq!(get_transaction(inserted.id, &conn), Err(Error::NotFound));
    }

    #[test]
    fn parse_transaction_id_rejects_malformed_ids() {
        use super::parse_transaction_id;

        assert_eq!(parse_transaction_id("42"), Ok(42));
        assert_eq!(
            parse_transaction_id("None"),
            Err(Error::InvalidTransactionId("None".to_owned()))
        );
        assert_eq!(
            parse_transaction_id("1.5"),
            Err(Error::InvalidTransactionId("1.5".to_owned()))
        );
    }

    #[test]
    fn serializes_id_as_string_and_camel_case_fields() {
        let conn = get_test_connection();
        let inserted = insert_transaction(test_transaction(), &conn).unwrap();

        let value = serde_json::to_value(&inserted).unwrap();

        assert_eq!(value["_id"], inserted.id.to_string());
        assert_eq!(value["wasteType"], "plastic");
        assert_eq!(value["original_points"], 22.0);
        assert_eq!(value["created_at"], "2025-01-15T10:30:00+05:30");
    }
}
