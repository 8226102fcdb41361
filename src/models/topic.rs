//! Topic model: a node in a user's topic tree.

use serde::{Deserialize, Serialize};

use super::double_option;

/// Name of the topic every account starts with.
pub const DEFAULT_TOPIC_NAME: &str = "My Flashcards";

/// Order key given to topics created through the API, placing them last.
pub const NEW_TOPIC_ORDER: i64 = 999;

/// Order key given to topics created on the fly by an import; sorts after
/// interactively created topics.
pub const IMPORTED_TOPIC_ORDER: i64 = 1000;

/// A named node in a user's topic tree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub order: i64,
    #[serde(skip)]
    pub user_id: i64,
}

/// Request body for creating a topic.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Request body for updating a topic. Only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTopicRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    /// `Some(None)` moves the topic to the root level.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
}

/// One entry of a bulk reorder request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderEntry {
    pub id: i64,
    pub order: i64,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
}
