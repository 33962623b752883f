//! dispatch-server: order dispatch & reconciliation service
//!
//! For each order-created event from the commerce platform:
//! - Resolves the fulfillment location and reconciles the processor fee
//! - Mirrors the order into the POS (kitchen display) with an external payment
//! - Creates a delivery job
//! - Writes an audit record of the outcome
//!
//! Operators can heal records, fix business dates, and clean up superseded
//! failure records through `/api/admin`.

mod api;
mod clients;
mod config;
mod dispatch;
mod error;
mod healing;
mod ledger;
mod state;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting dispatch-server (env: {})", config.environment);

    let state = AppState::new(&config)?;
    let app = api::create_router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("dispatch-server HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("dispatch-server stopped");
    Ok(())
}

/// `RUST_LOG` filter; `LOG_FORMAT=json` for structured output
///
/// Reads the env directly since it runs before [`Config`] is loaded.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dispatch_server=info,shared=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
