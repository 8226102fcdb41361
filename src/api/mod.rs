//! REST API module.
//!
//! Contains all API routes and handlers following the client contract.

mod accounts;
mod cards;
mod topics;
mod transfer;

pub use accounts::*;
pub use cards::*;
pub use topics::*;
pub use transfer::*;

use axum::extract::{FromRequest, FromRequestParts};
use serde::Serialize;

use crate::errors::AppError;

/// Response type for handlers.
pub type ApiResult<T> = Result<T, AppError>;

/// JSON body extractor whose rejections are reported as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections are reported as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Body of responses that only confirm an action.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of responses that created a row.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

/// Reject blank required text fields.
fn require_text(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
