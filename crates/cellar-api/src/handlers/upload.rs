//! Multipart upload handler.

use crate::error::HttpError;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use cellar_core::CellarError;
use cellar_storage::ByteStream;
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Durable handle for subsequent resolution.
    pub rel_path: String,
}

/// Accept a multipart form with fields `binId` and `file`, hand the payload
/// to the transfer service, and return the relative path on success.
#[tracing::instrument(skip(state, multipart), fields(operation = "upload"))]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), HttpError> {
    let mut bin_id: Option<i64> = None;
    let mut payload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CellarError::InvalidInput(format!("bad multipart form: {e}")))?
    {
        match field.name() {
            Some("binId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| CellarError::InvalidInput(format!("bad binId field: {e}")))?;
                let parsed = text.trim().parse::<i64>().map_err(|_| {
                    CellarError::InvalidInput(format!(
                        "bad binId `{text}`, it should be a positive integer"
                    ))
                })?;
                if parsed < 0 {
                    return Err(CellarError::InvalidInput(format!(
                        "bad binId `{text}`, it should be a positive integer"
                    ))
                    .into());
                }
                bin_id = Some(parsed);
            }
            Some("file") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        CellarError::InvalidInput("upload is missing a file name".to_string())
                    })?;
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CellarError::InvalidInput(format!("bad file field: {e}")))?;
                payload = Some((name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let bin_id = bin_id
        .ok_or_else(|| CellarError::InvalidInput("missing `binId` field".to_string()))?;
    let (name, content_type, data) = payload.ok_or_else(|| {
        CellarError::InvalidInput(
            "missing file in upload, did you include it under the name `file`?".to_string(),
        )
    })?;

    let size = data.len() as i64;
    let stream: ByteStream = Box::new(Cursor::new(data));

    let rel_path = state
        .transfer
        .upload(bin_id, &name, content_type.as_deref(), size, stream)
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { rel_path })))
}

#[derive(Debug, Serialize)]
pub struct FileTypeResponse {
    pub content_type: String,
}

/// Report the content type an upload of this file would be stored with:
/// the declared part type, else a guess from the file name.
pub async fn file_type(
    mut multipart: Multipart,
) -> Result<Json<FileTypeResponse>, HttpError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CellarError::InvalidInput(format!("bad multipart form: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().map(str::to_string);
        let content_type = cellar_services::resolve_content_type(declared.as_deref(), &name);
        return Ok(Json(FileTypeResponse { content_type }));
    }

    Err(CellarError::InvalidInput(
        "missing file in request, did you include it under the name `file`?".to_string(),
    )
    .into())
}
