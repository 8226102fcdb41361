//! Account endpoints: registration, login and profile changes.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;

use super::{require_text, ApiJson, ApiResult, MessageResponse};
use crate::auth::{hash_password_blocking, verify_password_blocking, CurrentUser};
use crate::errors::AppError;
use crate::models::{
    CredentialsRequest, UpdatePasswordRequest, UpdateTitleRequest, UpdateUsernameRequest,
    UserProfile,
};
use crate::AppState;

/// Body returned when a session is opened.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

/// POST /auth/register - Create an account and log it in.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let username = request.username.trim();
    require_text(username, "Username")?;
    require_text(&request.password, "Password")?;

    if state.repo.find_user_by_name(username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists.".to_string()));
    }

    let hash = hash_password_blocking(request.password.clone()).await?;
    let user = state.repo.create_user(username, &hash).await?;
    let token = state
        .repo
        .create_session(user.id, state.config.session_ttl_hours)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "Account created".to_string(),
            token,
            user: user.profile(),
        }),
    ))
}

/// POST /auth/login - Open a session.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CredentialsRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let invalid = || AppError::Unauthorized("Invalid username or password.".to_string());

    let user = state
        .repo
        .find_user_by_name(request.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password_blocking(request.password.clone(), user.password_hash.clone()).await? {
        tracing::info!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    let token = state
        .repo
        .create_session(user.id, state.config.session_ttl_hours)
        .await?;

    Ok(Json(SessionResponse {
        message: "Logged in".to_string(),
        token,
        user: user.profile(),
    }))
}

/// POST /auth/logout - Close the presented session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<MessageResponse>> {
    state.repo.delete_session(&current.token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// GET /api/user - The caller's profile.
pub async fn get_profile(Extension(current): Extension<CurrentUser>) -> Json<UserProfile> {
    Json(current.user.profile())
}

/// PUT /api/user/title - Change the display title.
pub async fn update_title(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<UpdateTitleRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("No title provided".to_string()))?;

    state.repo.update_title(current.id(), title).await?;

    Ok(Json(MessageResponse::new("Title updated successfully")))
}

/// PUT /api/user/username - Change the username.
pub async fn update_username(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<UpdateUsernameRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let username = request.username.trim();
    require_text(username, "Username")?;

    if username != current.user.username {
        state.repo.update_username(current.id(), username).await?;
    }

    Ok(Json(MessageResponse::new("Username updated successfully.")))
}

/// PUT /api/user/password - Change the password after checking the current one.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(request): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let matches = verify_password_blocking(
        request.current_password.clone(),
        current.user.password_hash.clone(),
    )
    .await?;
    if !matches {
        return Err(AppError::Validation(
            "Incorrect current password.".to_string(),
        ));
    }
    if request.new_password != request.confirm_password {
        return Err(AppError::Validation(
            "New passwords do not match.".to_string(),
        ));
    }
    require_text(&request.new_password, "New password")?;

    let hash = hash_password_blocking(request.new_password.clone()).await?;
    state.repo.update_password_hash(current.id(), &hash).await?;

    Ok(Json(MessageResponse::new("Password updated successfully.")))
}
