use askama::Template;
use axum::{extract::Path, response::Html, routing::get, Router};

use crate::types::AppResult;

/// Confirmation page; askama escapes `protocolo` before it reaches the HTML.
#[derive(Template)]
#[template(path = "success.html")]
struct SuccessTemplate<'a> {
    protocolo: &'a str,
}

pub fn router() -> Router {
    Router::new().route("/success/{protocolo}", get(success_page))
}

async fn success_page(Path(protocolo): Path<String>) -> AppResult<Html<String>> {
    Ok(Html(render_success(&protocolo)?))
}

pub fn render_success(protocolo: &str) -> AppResult<String> {
    Ok(SuccessTemplate { protocolo }.render()?)
}
