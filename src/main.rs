//! # Attendify Server
//!
//! Attendance API built with Axum and Tokio: JWT login, QR and face
//! attendance, role dashboards and reports.
//!
//! ## Environment Setup
//! Settings come from the environment (and `.env` when present). See
//! [`attendify::config`] for the full list.
//!
//! ## Running the Server
//! ```bash
//! cargo run --bin attendify-server
//! ```
//!
//! The server listens on `http://0.0.0.0:5000` by default and runs against
//! seeded in-memory storage unless `STORAGE_BACKEND=postgres` is set.
//!
//! ## Health Check
//! ```bash
//! curl http://localhost:5000/api/health
//! ```

use attendify::{config::Config, server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point.
///
/// Loads `.env`, initializes logging (`RUST_LOG`, default `info`) and runs
/// the HTTP server until the process is terminated.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false) // Don't show module targets for cleaner output
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting Attendify...");
    tracing::info!("📦 Package: {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!("🏗️  Build profile: {}", if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    });

    let config = Config::from_env()?;
    server::start(config).await
}
