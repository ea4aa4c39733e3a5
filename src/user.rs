//! Storage for users and their running points balance.
//!
//! The balance is only ever written through [adjust_user_points], which
//! applies deltas as a single atomic UPDATE at the store level. Reading the
//! balance, adding the delta in Rust, and writing it back would lose updates
//! under concurrent requests for the same user.

use rusqlite::{Connection, params};

use crate::Error;

/// Create the user table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                username TEXT PRIMARY KEY,
                points REAL NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create a user with a zero points balance.
///
/// # Errors
/// Returns [Error::SqlError] if the username already exists or there is some
/// other SQL error.
pub fn create_user(username: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO user (username, points) VALUES (?1, 0)",
        params![username],
    )?;

    Ok(())
}

type RowsAffected = usize;

/// Apply `delta` to the user's points balance.
///
/// The whole adjustment happens inside a single UPDATE statement so that
/// concurrent adjustments to the same user cannot lose each other's writes.
///
/// Returns the number of rows affected: zero means no user row matched
/// `username`. Callers decide whether that is an error; the write protocol
/// treats it as a skipped adjustment.
///
/// # Errors
/// Returns the underlying [rusqlite::Error] if the statement fails, so that
/// callers in the write protocol can wrap it in the partial-failure error.
pub fn adjust_user_points(
    username: &str,
    delta: f64,
    connection: &Connection,
) -> Result<RowsAffected, rusqlite::Error> {
    connection.execute(
        "UPDATE user SET points = points + ?1 WHERE username = ?2",
        params![delta, username],
    )
}

/// Retrieve a user's current points balance.
///
/// # Errors
/// Returns [Error::NotFound] if there is no user with `username`, or
/// [Error::SqlError] if there is some other SQL error.
pub fn get_user_points(username: &str, connection: &Connection) -> Result<f64, Error> {
    let points = connection
        .prepare("SELECT points FROM user WHERE username = :username")?
        .query_row(&[(":username", &username)], |row| row.get(0))?;

    Ok(points)
}
