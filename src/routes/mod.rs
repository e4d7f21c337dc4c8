//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the store websocket at `/api/ws`, a health probe,
//! and optionally the browser front-end as static files at `/`.

pub mod ws;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router. `static_dir`, when set, is served at `/`.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match static_dir {
        Some(dir) => {
            let site = Router::new()
                .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
                .layer(CompressionLayer::new());
            router.merge(site)
        }
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
