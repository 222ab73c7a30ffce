use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use edgeguard::cache::{CacheStore, MemoryStore};
use edgeguard::{AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (LOG_FORMAT=json for structured output)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting edgeguard v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration; malformed filter rules abort startup here
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        cache_enabled = config.cache_enabled,
        ip_filter_enabled = config.ip_filter.is_enabled(),
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    } else {
        info!("Prometheus metrics disabled (METRICS_PORT=0)");
    }

    let memory = MemoryStore::new(config.cache_max_entries);
    info!(
        store = memory.name(),
        max_entries = memory.max_entries(),
        "Cache store initialized"
    );
    let store: Arc<dyn CacheStore> = Arc::new(memory);

    let state = AppState::new(config.clone(), store);
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("Endpoints:");
    info!("  GET  /health        - Health check");
    info!("  GET  /blog          - Blog index (cacheable)");
    info!("  GET  /blog/{{slug}}   - Blog post (cacheable)");
    info!("  GET  /admin/stats   - Live statistics");
    info!("  POST /echo          - Echo request body");
    info!("  GET  /teapot        - 418");

    // The peer address is the IP filter's fallback when no forwarding header is set
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("Server shutdown complete");
    Ok(())
}
