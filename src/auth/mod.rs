//! Session authentication.
//!
//! Clients obtain an opaque token from `/auth/register` or `/auth/login` and send
//! it as `Authorization: Bearer <token>`. The layer resolves the token to the
//! owning user and stores a [`CurrentUser`] in the request extensions.

mod password;

pub use password::*;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

/// The authenticated user of a request, plus the session token it presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session authentication layer.
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return AppError::Unauthorized("Missing session token".to_string()).into_response();
    };

    match state.repo.user_for_session(&token).await {
        Ok(Some(user)) => {
            request
                .extensions_mut()
                .insert(CurrentUser { user, token });
            next.run(request).await
        }
        Ok(None) => {
            AppError::Unauthorized("Invalid or expired session".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}
