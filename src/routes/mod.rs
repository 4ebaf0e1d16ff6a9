//! HTTP Routes
//!
//! - `POST /upload` - Multipart intake (stage locally, optionally mirror remotely)
//! - `GET /success/{protocolo}` - Confirmation page
//! - `GET /health` - Health check
//! - `/` - Static files from the public directory

pub mod health;
pub mod static_files;
pub mod success;
pub mod upload;

use axum::Router;
use crate::models::AppState;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router
///
/// Application routes take precedence; anything else falls through to the
/// static file service.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let public_dir = state.config.server.public_dir.clone();

    Router::new()
        .merge(upload::router(state.clone()))
        .merge(success::router())
        .merge(health::router(state))
        .merge(static_files::router(public_dir))
        .layer(TraceLayer::new_for_http())
}
