//! x402x Facilitator HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p x402x-facilitator
//!
//! # Run with a custom config path
//! CONFIG=/path/to/config.toml cargo run -p x402x-facilitator
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p x402x-facilitator
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — path to the TOML configuration file (default: `config.toml`)
//! - `HOST` — override bind address
//! - `PORT` — override port
//! - `RUST_LOG` — log level filter (default: `info`)

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use x402x_facilitator::config::FacilitatorConfig;
use x402x_facilitator::shutdown::ShutdownSignal;
use x402x_facilitator::{handlers, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    #[cfg(feature = "telemetry")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        #[cfg(feature = "telemetry")]
        tracing::error!("facilitator failed: {err}");
        #[cfg(not(feature = "telemetry"))]
        eprintln!("facilitator failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FacilitatorConfig::load()?;

    #[cfg(feature = "telemetry")]
    tracing::info!(host = %config.host, port = config.port, networks = config.networks.len(), "loaded configuration");

    if config.networks.is_empty() {
        #[cfg(feature = "telemetry")]
        tracing::warn!("no networks configured — facilitator will report no supported schemes");
    }

    let shutdown = ShutdownSignal::try_new()?;
    let app_state = state::build(&config, shutdown.token())?;
    let app_state = std::sync::Arc::new(app_state);

    let app = handlers::router(std::sync::Arc::clone(&app_state));
    let service: IntoMakeServiceWithConnectInfo<_, SocketAddr> = app.into_make_service_with_connect_info();

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    #[cfg(feature = "telemetry")]
    tracing::info!("facilitator listening on http://{addr}");

    let token = shutdown.token();
    axum::serve(listener, service).with_graceful_shutdown(shutdown.recv()).await?;

    let pools: Vec<_> = app_state.networks.values().filter_map(|runtime| runtime.pool.clone()).collect();
    for pool in &pools {
        pool.begin_shutdown();
    }
    let drained = ShutdownSignal::drain(
        &token,
        async {
            // Pools reject new work immediately on `begin_shutdown`; this just
            // gives already-queued settlements a bounded window to finish.
            tokio::time::sleep(Duration::from_millis(100)).await;
        },
        Duration::from_secs(30),
    )
    .await;

    #[cfg(feature = "telemetry")]
    if drained {
        tracing::info!("facilitator shut down gracefully");
    } else {
        tracing::warn!("facilitator shutdown timed out waiting for in-flight settlements");
    }
    #[cfg(not(feature = "telemetry"))]
    let _ = drained;

    Ok(())
}
