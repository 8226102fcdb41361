//! Topic API endpoints.

use axum::{
    extract::State,
    Extension, Json,
};

use super::{
    require_text, ApiJson, ApiPath, ApiResult, CreatedResponse, MessageResponse,
};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{CreateTopicRequest, ReorderEntry, Topic, UpdateTopicRequest};
use crate::AppState;

/// GET /api/topics - List the caller's topics by order key.
pub async fn list_topics(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Topic>>> {
    Ok(Json(state.repo.list_topics(current.id()).await?))
}

/// POST /api/topics - Create a topic.
pub async fn create_topic(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<CreateTopicRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    require_text(&request.name, "Topic name")?;

    let topic = state.repo.create_topic(current.id(), &request).await?;

    Ok(Json(CreatedResponse {
        message: "Topic created".to_string(),
        id: topic.id,
    }))
}

/// PUT /api/topics/{id} - Rename, reorder or reparent a topic.
pub async fn update_topic(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateTopicRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(name) = &request.name {
        require_text(name, "Topic name")?;
    }

    state.repo.update_topic(current.id(), id, &request).await?;

    Ok(Json(MessageResponse::new("Topic updated")))
}

/// DELETE /api/topics/{id} - Delete a topic, its subtopics and their cards.
pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.repo.delete_topic(current.id(), id).await?;

    Ok(Json(MessageResponse::new("Topic deleted")))
}

/// PUT /api/topics/reorder - Bulk update order keys and parents.
pub async fn reorder_topics(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<serde_json::Value>,
) -> ApiResult<Json<MessageResponse>> {
    if !payload.is_array() {
        return Err(AppError::Validation("Invalid data".to_string()));
    }
    let entries: Vec<ReorderEntry> = serde_json::from_value(payload)
        .map_err(|e| AppError::Validation(format!("Invalid data: {}", e)))?;

    let applied = state.repo.reorder_topics(current.id(), &entries).await?;
    tracing::debug!("Reordered {} topics for user {}", applied, current.id());

    Ok(Json(MessageResponse::new("Topics reordered")))
}
