//! Card API endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};

use super::{
    require_text, ApiJson, ApiPath, ApiResult, CreatedResponse, MessageResponse,
};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{Card, CardListQuery, CreateCardRequest, UpdateCardRequest};
use crate::AppState;

/// GET /api/cards - List cards, optionally limited to a topic subtree.
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<CardListQuery>,
) -> ApiResult<Json<Vec<Card>>> {
    let topic_id = match params.topic_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid topic_id: {}", raw)))?,
        ),
    };

    Ok(Json(state.repo.list_cards(current.id(), topic_id).await?))
}

/// POST /api/cards - Add a card.
pub async fn create_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<CreateCardRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    require_text(&request.front, "Front")?;
    require_text(&request.back, "Back")?;

    let card = state.repo.create_card(current.id(), &request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Card added!".to_string(),
            id: card.id,
        }),
    ))
}

/// PUT /api/cards/{id} - Update a card.
pub async fn update_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateCardRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(front) = &request.front {
        require_text(front, "Front")?;
    }
    if let Some(back) = &request.back {
        require_text(back, "Back")?;
    }

    state.repo.update_card(current.id(), id, &request).await?;

    Ok(Json(MessageResponse::new("Card updated")))
}

/// DELETE /api/cards/{id} - Delete a card.
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<MessageResponse>> {
    state.repo.delete_card(current.id(), id).await?;

    Ok(Json(MessageResponse::new("Card deleted")))
}
