//! Multipart upload endpoint feeding the file store

use super::websocket::RelayState;
use crate::store::StoredUpload;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use std::sync::Arc;

/// Name of the multipart field carrying the file
pub const UPLOAD_FIELD: &str = "file";

/// `POST /upload`: store the `file` field and return its stored id
pub async fn upload_handler(
    State(state): State<Arc<RelayState>>,
    mut multipart: Multipart,
) -> Result<Json<StoredUpload>, (StatusCode, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let data = field.bytes().await.map_err(|e| (e.status(), e.body_text()))?;

        let upload = state.store.save(&file_name, data).await.map_err(|e| {
            tracing::error!("Failed to store upload {}: {}", file_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store upload".to_string(),
            )
        })?;
        return Ok(Json(upload));
    }

    Err((
        StatusCode::BAD_REQUEST,
        format!("Missing '{}' field", UPLOAD_FIELD),
    ))
}
