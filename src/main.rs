//! tutor-bff
//!
//! Backend-for-frontend sitting between the tutoring web app and its AI
//! backend.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                  tutor-bff                   │
//!   browser ─────▶│  /api/proxy/*        → forward → relay ──────┼──▶ AI backend
//!                 │  /api/proxy/chat     → forward → SSE stream  │
//!                 │  /api/proxy/meta-description → TTL cache ────┼──▶ third-party pages
//!                 │  /api/chat-sessions/* → session store ───────┼──▶ Postgres
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tutor_bff::config::load_config;
use tutor_bff::http::HttpServer;
use tutor_bff::lifecycle::{spawn_signal_listener, Shutdown};
use tutor_bff::observability::{logging, metrics};
use tutor_bff::sessions::open_store;

#[derive(Parser)]
#[command(name = "tutor-bff")]
#[command(about = "Backend-for-frontend for the tutoring app", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("tutor-bff v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = config.backend.url.as_deref().unwrap_or("<unset>"),
        use_real_backend = config.backend.use_real_backend,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = open_store(&config.database)?;
    if let Some(store) = &store {
        store.ensure_schema().await?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config, store)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
