use anyhow::Result;
use server::{create_router, AppState, Services};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_core::{
    cache::MemoryCacheBackend,
    config::AppConfig,
    store::{MemoryStore, SqliteStore, Store},
};

/// Initializes logging from `logging.level` and `logging.format`.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_logging(config: &AppConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,warden_core={level},server={level},tower_http={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

/// Opens the configured store. `memory` selects the in-memory store.
async fn init_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    if config.store.database_url == "memory" {
        info!("Using in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = SqliteStore::from_config(&config.store)
        .await
        .map_err(|e| anyhow::anyhow!("Store initialization failed: {e}"))?;
    store.ensure_schema().await.map_err(|e| anyhow::anyhow!("Schema bootstrap failed: {e}"))?;
    info!(database_url = %config.store.database_url, "SQLite store ready");

    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!("Starting warden");
    debug!(
        environment = %config.environment,
        rate_limit_enabled = config.rate_limiter.enabled,
        cache_enabled = config.cache.enabled,
        bind_port = config.server.bind_port,
        "Configuration loaded"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.bind_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {e}"))?;

    let store = init_store(&config).await?;
    let cache_backend = Arc::new(MemoryCacheBackend::new(config.cache.max_entries));
    let services = Services::from_config(config, store, cache_backend.clone())
        .map_err(|e| anyhow::anyhow!("Token authenticator initialization failed: {e}"))?;

    let sweep_handle =
        services.limiter.is_enabled().then(|| services.limiter.start_sweep_task());
    let purge_handle = tokio::spawn(purge_expired_entries(cache_backend));

    let app = create_router(AppState::new(services));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error occurred");
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
    }
    purge_handle.abort();
    info!("Server shutdown complete");

    Ok(())
}

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

async fn purge_expired_entries(backend: Arc<MemoryCacheBackend>) {
    let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        let removed = backend.purge_expired();
        if removed > 0 {
            debug!(removed, remaining = backend.len(), "purged expired cache entries");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
