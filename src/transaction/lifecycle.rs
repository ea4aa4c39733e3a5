//! The write protocol that keeps transaction points and user balances in agreement.
//!
//! Every create, update, and delete goes through this module, making it the
//! only writer of points on both the transaction and user tables. The
//! invariant it maintains: at any quiescent moment a user's balance equals
//! the sum of `points` over the transactions that reference them. Creates
//! add, deletes subtract, and updates apply the recomputed delta; the balance
//! is never recomputed from scratch.
//!
//! Each operation is a linear sequence of guarded steps. Validation happens
//! before the first store mutation, so validation failures leave no writes
//! behind. Once the transaction-row mutation commits, a failed balance
//! adjustment is reported as [Error::BalanceNotAdjusted] rather than being
//! swallowed or rolled into a total failure, because the row write cannot be
//! taken back.

use rusqlite::Connection;

use crate::{
    Error,
    points::{RateTable, parse_decimal},
    timezone::now_in_timezone,
    transaction::core::{
        NewTransaction, TransactionChanges, TransactionId, delete_transaction, get_transaction,
        insert_transaction, update_transaction,
    },
    user::adjust_user_points,
};

/// The lifecycle tag given to every newly created transaction.
const INITIAL_STATUS: &str = "pending";

/// The fields a client may supply when creating a transaction.
///
/// All fields are optional so that missing ones can be reported as
/// [Error::MissingField] instead of a deserialization failure. The quantity
/// is kept as a raw JSON value because clients send it as either a number or
/// a numeric string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CreateTransactionRequest {
    /// The submitting user.
    pub username: Option<String>,
    /// The waste category.
    pub waste_type: Option<String>,
    /// The amount of waste in kilograms, as a JSON number or numeric string.
    pub quantity: Option<serde_json::Value>,
    /// The collection center.
    pub center: Option<String>,
}

/// The subset of fields a client may change on an existing transaction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionPatch {
    /// New owner username.
    pub username: Option<String>,
    /// New waste category.
    pub waste_type: Option<String>,
    /// New quantity, as a JSON number or numeric string.
    pub quantity: Option<serde_json::Value>,
    /// New collection center.
    pub center: Option<String>,
    /// New lifecycle tag.
    pub status: Option<String>,
}

/// Whether an update call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// At least one field was written.
    Updated,
    /// The patch supplied nothing that would change the record.
    NoChanges,
}

/// Create a transaction and add its points to the owner's balance.
///
/// Validates the required fields, computes the point value from the rate
/// table, inserts the row with status "pending" and a creation timestamp in
/// the fixed civil timezone, then increments the user's balance by the
/// computed points.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingField] if username, wasteType, quantity, or center is
///   absent (no writes are performed),
/// - [Error::InvalidNumber] or [Error::NegativeQuantity] if the quantity
///   cannot be converted (no writes are performed),
/// - [Error::SqlError] if the insert fails (the balance is left untouched),
/// - or [Error::BalanceNotAdjusted] if the insert committed but the balance
///   increment failed.
pub fn create_with_points(
    request: CreateTransactionRequest,
    rates: &RateTable,
    local_timezone: &str,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    let username = request.username.ok_or(Error::MissingField("username"))?;
    let waste_type = request.waste_type.ok_or(Error::MissingField("wasteType"))?;
    let quantity_value = request.quantity.ok_or(Error::MissingField("quantity"))?;
    let center = request.center.ok_or(Error::MissingField("center"))?;

    let quantity = parse_decimal(&quantity_value)?;
    let points = rates.calculate_points(&waste_type, quantity);
    let created_at = now_in_timezone(local_timezone)?;

    let transaction = insert_transaction(
        NewTransaction {
            username: username.clone(),
            waste_type,
            quantity,
            points,
            center,
            status: INITIAL_STATUS.to_owned(),
            created_at,
            original_points: points,
        },
        connection,
    )?;

    apply_balance_delta(transaction.id, &username, points, connection)?;

    Ok(transaction.id)
}

/// Apply a partial update to a transaction, keeping points synchronized.
///
/// If the patch touches wasteType or quantity, the point value is recomputed
/// over the effective values (the supplied value, or the stored value for
/// fields the patch omits) and the difference is applied to the owning
/// user's balance. The balance adjustment always targets the pre-update
/// owner, even when the patch changes the username in the same call.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing transaction,
/// - [Error::InvalidNumber] or [Error::NegativeQuantity] if a supplied
///   quantity cannot be converted (no writes are performed),
/// - [Error::SqlError] if the row update fails (the balance is left
///   untouched),
/// - or [Error::BalanceNotAdjusted] if the row update committed but the
///   balance adjustment failed.
pub fn update_with_points(
    id: TransactionId,
    patch: TransactionPatch,
    rates: &RateTable,
    connection: &Connection,
) -> Result<UpdateOutcome, Error> {
    let existing = get_transaction(id, connection)?;

    let quantity = match &patch.quantity {
        Some(value) => Some(parse_decimal(value)?),
        None => None,
    };

    let mut new_points = existing.points;
    if patch.waste_type.is_some() || quantity.is_some() {
        let effective_waste_type = patch.waste_type.as_deref().unwrap_or(&existing.waste_type);
        let effective_quantity = quantity.unwrap_or(existing.quantity);
        new_points = rates.calculate_points(effective_waste_type, effective_quantity);
    }
    let delta = new_points - existing.points;

    let changes = TransactionChanges {
        username: patch.username,
        waste_type: patch.waste_type,
        quantity,
        points: (delta != 0.0).then_some(new_points),
        center: patch.center,
        status: patch.status,
    };

    if changes.is_empty() {
        return Ok(UpdateOutcome::NoChanges);
    }

    let rows_affected = update_transaction(id, &changes, connection)?;
    if rows_affected == 0 {
        // The transaction disappeared between the read and the write.
        return Err(Error::NotFound);
    }

    if delta != 0.0 {
        apply_balance_delta(id, &existing.username, delta, connection)?;
    }

    Ok(UpdateOutcome::Updated)
}

/// Delete a transaction and subtract its points from the owner's balance.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an existing transaction,
/// - [Error::SqlError] if the delete fails (the balance is left untouched),
/// - or [Error::BalanceNotAdjusted] if the delete committed but the balance
///   decrement failed. The transaction row is gone in that case and the
///   owner's balance is stale until reconciled.
pub fn delete_with_points(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let existing = get_transaction(id, connection)?;

    let rows_affected = delete_transaction(id, connection)?;
    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    apply_balance_delta(id, &existing.username, -existing.points, connection)
}

/// Apply `delta` to a user's balance, wrapping a store failure in the
/// partial-failure error since the transaction-row write has already
/// committed by the time this runs.
fn apply_balance_delta(
    transaction_id: TransactionId,
    username: &str,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    match adjust_user_points(username, delta, connection) {
        Ok(0) => {
            // An unknown username is not an error here. Transactions may
            // reference users the balance table never provisioned.
            tracing::warn!(
                "no user row for \"{username}\", skipped balance adjustment of {delta} \
                for transaction {transaction_id}"
            );
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(source) => Err(Error::BalanceNotAdjusted {
            transaction_id,
            username: username.to_owned(),
            delta,
            source,
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
