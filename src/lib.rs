//! A web server that tracks waste-recycling transactions and the reward
//! points they earn.
//!
//! Each transaction records who recycled what, where, and how much. Points
//! are derived from the waste type and quantity, and every write keeps the
//! owner's points balance equal to the sum of their transactions' points.
#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod db;
mod endpoints;
mod error;
mod points;
mod routing;
mod timezone;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use points::RateTable;
pub use routing::build_router;
pub use user::{create_user, get_user_points};

/// Tell the server to shut down when ctrl+c or SIGTERM is received.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received shutdown signal.");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
