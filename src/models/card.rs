//! Flashcard model.

use serde::{Deserialize, Serialize};

use super::double_option;

/// Category used when a card is added without one.
pub const DEFAULT_CATEGORY: &str = "General";

/// A flashcard owned by a user, optionally filed under a topic.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Card {
    pub id: i64,
    pub category: String,
    pub front: String,
    pub back: String,
    pub topic_id: Option<i64>,
    #[serde(skip)]
    pub user_id: i64,
}

/// Request body for adding a card.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
    #[serde(default)]
    pub topic_id: Option<i64>,
}

/// Request body for updating a card. Only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCardRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
    /// `Some(None)` moves the card back to the default topic.
    #[serde(default, deserialize_with = "double_option")]
    pub topic_id: Option<Option<i64>>,
}

/// Query string of `GET /api/cards`.
#[derive(Debug, Clone, Deserialize)]
pub struct CardListQuery {
    #[serde(default)]
    pub topic_id: Option<String>,
}

/// A card ready to be inserted by an import, with its target topic resolved.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub category: String,
    pub front: String,
    pub back: String,
    pub topic_id: Option<i64>,
}
