pub mod analytics;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use api::{create_router, AppState};
pub use error::{ApiError, ApiResult};
pub use store::{MemoryStore, MongoStore, Store};

use crate::analytics::{AnalyticsSource, Ga4Client};
use crate::config::AppConfig;

/// Serve the API on an already-bound listener until shutdown is signalled.
pub async fn serve<S: Store + 'static>(
    listener: TcpListener,
    state: AppState<S>,
) -> anyhow::Result<()> {
    let app = create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

/// Load configuration, pick a store and serve on the configured address.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let analytics: Arc<dyn AnalyticsSource> = Arc::new(Ga4Client::from_config(&config.analytics)?);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Listening on http://{}", bind_address);

    if config.database.in_memory {
        log::warn!("Using the in-memory store; data is lost on restart");
        let state = AppState::new(Arc::new(MemoryStore::new()), analytics, config);
        serve(listener, state).await
    } else {
        let database_url = config.database_url()?;
        let store = MongoStore::new(&database_url, &config.database.name).await?;
        log::info!("Connected to MongoDB database {}", config.database.name);
        let state = AppState::new(Arc::new(store), analytics, config);
        serve(listener, state).await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}
