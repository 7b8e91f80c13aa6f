//! File resolution: stream-or-redirect, and deletion.

use crate::error::HttpError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use cellar_core::CellarError;
use cellar_storage::GetOutcome;
use tokio_util::io::ReaderStream;

/// Resolve a relative path and answer with the bytes or, for redirect bins,
/// a permanent redirect to the bin's own endpoint.
#[tracing::instrument(skip(state), fields(operation = "download"))]
pub async fn download(
    State(state): State<AppState>,
    Path(rel_path): Path<String>,
) -> Result<Response, HttpError> {
    let record = state.manager.get_file(&rel_path).await?;

    match record.bin.resolve_get(&record.info.rel_path).await? {
        GetOutcome::Redirect(url) => Ok(Redirect::permanent(&url).into_response()),
        GetOutcome::Stream(stream) => {
            let body = Body::from_stream(ReaderStream::new(stream));
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, record.info.content_type)
                .header(header::CONTENT_LENGTH, record.info.size.to_string())
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}\"", record.info.name.replace('"', "")),
                )
                .body(body)
                .map_err(|e| HttpError(CellarError::Internal(e.to_string())))
        }
    }
}

/// Delete a file: physical bytes first, then the metadata row.
#[tracing::instrument(skip(state), fields(operation = "delete"))]
pub async fn delete(
    State(state): State<AppState>,
    Path(rel_path): Path<String>,
) -> Result<StatusCode, HttpError> {
    state.transfer.delete(&rel_path).await?;
    Ok(StatusCode::NO_CONTENT)
}
