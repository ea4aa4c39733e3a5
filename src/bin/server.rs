//! The server binary.

use std::{fs::File, net::SocketAddr, path::PathBuf, process::exit};

use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ecopoints::{AppState, RateTable, build_router, graceful_shutdown};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The path to the SQLite database file.
    #[arg(long, default_value = "ecopoints.db")]
    db_path: PathBuf,

    /// The port to serve the API on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// The canonical timezone name used for transaction timestamps.
    #[arg(long, default_value = "Asia/Kolkata")]
    timezone: String,

    /// The path to a JSON file mapping waste types to points per kilogram.
    /// The built-in rates are used when omitted.
    #[arg(long)]
    rates_path: Option<PathBuf>,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn load_rate_table(rates_path: Option<&PathBuf>) -> RateTable {
    let Some(path) = rates_path else {
        return RateTable::default();
    };

    let file = File::open(path).unwrap_or_else(|error| {
        tracing::error!("Could not open rates file {}: {error}", path.display());
        exit(1);
    });

    serde_json::from_reader(file).unwrap_or_else(|error| {
        tracing::error!("Could not parse rates file {}: {error}", path.display());
        exit(1);
    })
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let rate_table = load_rate_table(args.rates_path.as_ref());

    let db_connection = Connection::open(&args.db_path).unwrap_or_else(|error| {
        tracing::error!(
            "Could not open database file {}: {error}",
            args.db_path.display()
        );
        exit(1);
    });

    let state = AppState::new(db_connection, &args.timezone, rate_table).unwrap_or_else(|error| {
        tracing::error!("Could not create the application state: {error}");
        exit(1);
    });

    let router = build_router(state).layer(TraceLayer::new_for_http());

    let address = SocketAddr::from(([0, 0, 0, 0], args.port));
    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    tracing::info!("Serving on {address}");

    axum_server::bind(address)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap_or_else(|error| {
            tracing::error!("The server stopped unexpectedly: {error}");
            exit(1);
        });
}
