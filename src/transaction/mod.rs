//! Waste-recycling transactions and the points-consistency rules that keep
//! each user's balance equal to the sum of their transactions' points.

pub(crate) mod core;
mod create_transaction_endpoint;
mod delete_transaction_endpoint;
pub(crate) mod lifecycle;
pub(crate) mod query;
mod search_transactions_endpoint;
mod update_transaction_endpoint;

pub use core::{TransactionId, create_transaction_table};
pub use create_transaction_endpoint::create_transaction_endpoint;
pub use delete_transaction_endpoint::delete_transaction_endpoint;
pub use search_transactions_endpoint::search_transactions_endpoint;
pub use update_transaction_endpoint::update_transaction_endpoint;
