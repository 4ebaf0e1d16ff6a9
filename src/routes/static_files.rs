//! Static File Serving
//!
//! Serves the intake form and its assets from the public directory. When the
//! directory has no `index.html`, `/` falls back to a bare upload form so the
//! service stays usable on its own.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tracing::{info, warn};

const FALLBACK_FORM: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Envio de Documentos</title>
</head>
<body>
    <h1>Envio de Documentos</h1>
    <form action="/upload" method="post" enctype="multipart/form-data">
        <p><label>Número do protocolo <input type="text" name="protocolo" required></label></p>
        <p><label>Documentos <input type="file" name="documento" multiple></label></p>
        <p><label>Comprovantes de pagamento <input type="file" name="comprovante" multiple></label></p>
        <p><button type="submit">Enviar</button></p>
    </form>
</body>
</html>"#;

/// Create router for serving static files
pub fn router(public_dir: PathBuf) -> Router {
    if public_dir.is_dir() {
        info!(path = %public_dir.display(), "Serving static files");
    } else {
        warn!(path = %public_dir.display(), "Public directory not found, serving built-in upload form");
    }

    let serve_dir = ServeDir::new(&public_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(serve_index))
        .fallback_service(serve_dir)
        .with_state(public_dir)
}

/// Serve the index page
async fn serve_index(State(public_dir): State<PathBuf>) -> Response {
    let content = match tokio::fs::read_to_string(public_dir.join("index.html")).await {
        Ok(content) => content,
        Err(_) => FALLBACK_FORM.to_string(),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        content,
    )
        .into_response()
}
