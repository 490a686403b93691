//! Mind Match Back binary entrypoint wiring REST, WebSocket, and storage layers.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::document_store::memory::MemoryStore;
use services::identity::PassthroughIdentity;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    // Real token verification is a deployment concern; the passthrough
    // provider keeps local runs usable out of the box.
    app_state
        .install_identity(Arc::new(PassthroughIdentity))
        .await;

    if env::var("STORE_BACKEND").as_deref() == Ok("memory") {
        info!("using in-memory document store (STORE_BACKEND=memory)");
        app_state.install_store(Arc::new(MemoryStore::new())).await;
    } else {
        spawn_store_supervisor(app_state.clone()).await;
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

#[cfg(feature = "mongo-store")]
async fn spawn_store_supervisor(state: SharedState) {
    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();
    tokio::spawn(run_store_supervisor(state, uri, db_name));
}

#[cfg(not(feature = "mongo-store"))]
async fn spawn_store_supervisor(state: SharedState) {
    warn!("built without the mongo-store feature; falling back to the in-memory store");
    state.install_store(Arc::new(MemoryStore::new())).await;
}

/// Supervises the MongoDB connection by retrying in the background and
/// toggling degraded mode when connectivity changes.
#[cfg(feature = "mongo-store")]
async fn run_store_supervisor(state: SharedState, uri: String, db_name: Option<String>) {
    use dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};
    use tracing::error;

    let initial_delay_ms = 1000;
    let mut delay = Duration::from_millis(initial_delay_ms);
    let max_delay = Duration::from_secs(10);

    loop {
        if let Some(store) = state.store().await {
            match store.health_check().await {
                Ok(_) => {
                    // Healthy connection: reset the retry backoff and avoid
                    // hammering the database with pings.
                    delay = Duration::from_millis(initial_delay_ms);
                    sleep(Duration::from_secs(5)).await;
                }
                Err(err) => {
                    // Existing connection failed: drop it, flip to degraded
                    // mode, and retry with exponential backoff.
                    warn!(error = %err, "store health check failed; entering degraded mode");
                    state.clear_store().await;
                    sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
            continue;
        }

        match MongoConfig::from_uri(&uri, db_name.as_deref()).await {
            Ok(config) => match MongoDocumentStore::connect(config).await {
                Ok(store) => {
                    info!("connected to MongoDB; leaving degraded mode");
                    state.install_store(Arc::new(store)).await;
                    delay = Duration::from_millis(initial_delay_ms);
                }
                Err(err) => {
                    error!(%err, "MongoDB connection attempt failed");
                    sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            },
            Err(err) => {
                warn!(error = %err, "invalid MongoDB configuration");
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
