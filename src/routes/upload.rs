//! Intake handler
//!
//! `POST /upload` takes a multipart form with a `protocolo` text field and
//! files under `documento` and `comprovante`. Files are buffered until the
//! whole form is read, staged under `uploads/<protocolo>/`, optionally
//! mirrored to the remote store, and the client is redirected to
//! `/success/<protocolo>`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Redirect,
    routing::post,
    Router,
};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{AppState, IncomingFile};
use crate::types::{AppError, AppResult, Category, ProtocolNumber};

const PROTOCOL_FIELD: &str = "protocolo";
const MISSING_INPUT_MESSAGE: &str = "Número de protocolo ou arquivos não enviados.";

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_body_bytes;
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub protocol: Option<ProtocolNumber>,
    pub files: Vec<IncomingFile>,
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Redirect> {
    info!("Upload request received");

    let form = read_form(&mut multipart, state.config.uploads.max_files_per_field).await?;

    let protocol = match form.protocol {
        Some(p) if !form.files.is_empty() => p,
        _ => return Err(AppError::BadRequest(MISSING_INPUT_MESSAGE.to_string())),
    };

    info!(protocol = %protocol, files = form.files.len(), "Staging upload");
    let staged = state.storage.stage(&protocol, form.files).await?;

    if let Some(sync) = &state.sync {
        let report = sync
            .sync(&protocol, &staged)
            .await
            .map_err(|e| AppError::RemoteSync(e.to_string()))?;
        if let Some(message) = report.first_error() {
            return Err(AppError::RemoteSync(message.to_string()));
        }
    }

    Ok(Redirect::to(&format!(
        "/success/{}",
        urlencoding::encode(protocol.as_str())
    )))
}

/// Drain the multipart body into an [`UploadForm`].
///
/// Only parts carrying a filename count as files; empty file inputs are
/// skipped. A file under an unknown field, or more than
/// `max_files_per_field` under one field, is a client error.
pub async fn read_form(multipart: &mut Multipart, max_files_per_field: usize) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    let mut counts: HashMap<Category, usize> = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());

        if field_name == PROTOCOL_FIELD {
            let value = field.text().await?;
            form.protocol = ProtocolNumber::parse(&value);
            continue;
        }

        // Parts without a filename are plain form values, never files
        let Some(original_name) = file_name else {
            debug!(field = %field_name, "Ignoring text form field");
            continue;
        };

        let Some(category) = Category::from_field(&field_name) else {
            return Err(AppError::BadRequest(format!("Unexpected field: {}", field_name)));
        };

        let data = field.bytes().await?;
        if original_name.is_empty() && data.is_empty() {
            continue;
        }

        let count = counts.entry(category).or_insert(0);
        *count += 1;
        if *count > max_files_per_field {
            return Err(AppError::BadRequest(format!(
                "Too many files for field {}",
                category.field_name()
            )));
        }

        debug!(field = %field_name, file = %original_name, size = data.len(), "Received file");
        form.files.push(IncomingFile {
            category,
            original_name,
            data,
        });
    }

    Ok(form)
}
