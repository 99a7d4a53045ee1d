use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::auth;
use crate::auth::{CredentialStore, StoreOptions};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub store: CredentialStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(auth::show_page).post(auth::submit))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(err) => {
            error!("health check failed: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
        }
    }
}

/// Opens the store and serves until Ctrl-C or SIGTERM.
///
/// Fails before binding if the store cannot be opened.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let options =
        StoreOptions::new(&config.database_url).with_max_connections(config.max_connections);
    let store = CredentialStore::open(&options)
        .await
        .with_context(|| format!("failed to open credential store at {}", config.database_url))?;

    let state = Arc::new(AppState { store });
    let app = router(state);

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen))?;

    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
