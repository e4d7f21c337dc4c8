//! Sketchboard store server.
//!
//! Serves the path store over a websocket at `/api/ws`, optionally backed by
//! JSON snapshot files in `DATA_DIR`, and optionally the browser front-end
//! from `STATIC_DIR`.

mod config;
mod routes;
mod services;
mod state;

use std::process::ExitCode;

use tracing::{error, info};

use crate::config::{Config, ConfigError};
use crate::services::persistence::{self, PersistError};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },
    #[error("server failed: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sketchboard stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let state = AppState::from_config(&config);

    let loaded = persistence::load_all(&state).await?;
    if state.persists() {
        info!(loaded, data_dir = ?config.data_dir, "snapshots loaded");
        let _persistence = persistence::spawn_persistence_task(state.clone(), config.flush_interval);
    } else {
        info!("no DATA_DIR; values are kept in memory only");
    }

    let app = routes::app(state, config.static_dir.as_deref());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .map_err(|source| StartupError::Bind { port: config.port, source })?;

    info!(port = config.port, static_dir = ?config.static_dir, "sketchboard listening");
    axum::serve(listener, app).await.map_err(StartupError::Serve)
}
