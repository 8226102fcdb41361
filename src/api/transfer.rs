//! Card import and export endpoints.

use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::transfer::{parse_import, render_export, EXPORT_FILE_NAME};
use crate::AppState;

/// Body of a successful import.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub count: usize,
}

/// The parts of an import upload.
struct ImportUpload {
    file: Vec<u8>,
    topic_id: Option<i64>,
}

/// POST /api/cards/import - Import cards from an uploaded JSON file.
pub async fn import_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<ImportResponse>)> {
    let multipart =
        multipart.map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e.body_text())))?;
    let upload = read_upload(multipart).await?;
    let items = parse_import(&upload.file)?;

    let count = state
        .repo
        .import_cards(current.id(), upload.topic_id, &items)
        .await
        .map_err(|e| match e {
            AppError::Database(msg) | AppError::Internal(msg) => {
                AppError::Internal(format!("Failed to process file: {}", msg))
            }
            other => other,
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            message: format!("Successfully imported {} cards!", count),
            count,
        }),
    ))
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<ImportUpload> {
    let mut file = None;
    let mut topic_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if field.file_name().map_or(true, str::is_empty) {
                    return Err(AppError::Validation("No selected file".to_string()));
                }
                file = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            Some("topic_id") => {
                // A topic id that is not a number is ignored.
                let raw = field.text().await.map_err(multipart_error)?;
                topic_id = raw.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("No file part".to_string()))?;
    Ok(ImportUpload { file, topic_id })
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
}

/// GET /account/export - Download every card of the caller as JSON.
pub async fn export_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let items = state.repo.export_cards(current.id()).await?;
    let body = render_export(&items)?;

    tracing::info!("Exported {} cards for user {}", items.len(), current.id());

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment;filename={}", EXPORT_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}
