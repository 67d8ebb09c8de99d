//! HTTP front end for the training client: registers job configurations and gates training
//! submissions through the model state checker.

use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};
use trainer_core::{AppConfig, ConfigStore, FsConfigStore};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod trainer;

use trainer::{LocalTrainingStub, TrainingRunner};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub api_key: Option<String>,
    pub trainer: Arc<dyn TrainingRunner>,
}

impl AppState {
    pub fn new(store: Arc<dyn ConfigStore>, api_key: Option<String>) -> Self {
        Self { store, api_key, trainer: Arc::new(LocalTrainingStub) }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/configure", post(handlers::configure))
        .route("/train", post(handlers::train))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .merge(protected)
        .with_state(state)
}

/// Bind the configured address and serve until ctrl-c.
pub async fn run(cfg: AppConfig) -> Result<()> {
    let addr = cfg.socket_addr()?;
    if cfg.api_key.is_none() {
        warn!("api_key_not_configured");
    }
    let store = Arc::new(FsConfigStore::new(&cfg.data_dir));
    let state = AppState::new(store, cfg.api_key.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, data_dir = %cfg.data_dir.display(), "training_api_listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("training_api_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "shutdown_signal_failed");
        std::future::pending::<()>().await;
    }
}
