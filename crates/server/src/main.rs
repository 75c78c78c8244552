//! Inkwell server entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fred::prelude::*;
use inkwell_api::AppState;
use inkwell_common::{
    Config, LocalStorage, MemoryPageCache, RedisPageCache, SharedPageCache,
    config::CacheBackend,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Build the page cache backend named in the configuration.
async fn page_cache(config: &Config) -> anyhow::Result<SharedPageCache> {
    match config.cache.backend {
        CacheBackend::Memory => {
            info!("Using in-process page cache");
            Ok(Arc::new(MemoryPageCache::new()))
        }
        CacheBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .context("cache.backend = \"redis\" needs a [redis] section")?;

            info!("Connecting to Redis...");
            let fred_config = fred::types::config::Config::from_url(&redis.url)
                .context("Failed to parse Redis URL")?;
            let client = fred::clients::Client::new(fred_config, None, None, None);
            client.connect();
            client
                .wait_for_connect()
                .await
                .context("Failed to connect to Redis")?;
            info!("Connected to Redis page cache");

            Ok(Arc::new(RedisPageCache::new(
                Arc::new(client),
                redis.prefix.clone(),
            )))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting inkwell server...");

    let config = Config::load().context("Failed to load configuration")?;

    let db = inkwell_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    inkwell_db::migrate(&db).await?;
    info!("Migrations completed");

    let storage = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));
    let cache = page_cache(&config).await?;

    let state = AppState::new(Arc::new(db), &config, storage, cache)
        .context("Failed to build application state")?;
    let body_limit = state.max_body_bytes;

    let app = inkwell_api::router(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
