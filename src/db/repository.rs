//! Database repository for CRUD operations.
//!
//! Every public method acts on behalf of one user and checks ownership before it
//! touches a row. Operations that write more than one statement run inside a
//! single transaction.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Card, CreateCardRequest, CreateTopicRequest, NewCard, ReorderEntry, Topic, UpdateCardRequest,
    UpdateTopicRequest, User, DEFAULT_CATEGORY, DEFAULT_TITLE, DEFAULT_TOPIC_NAME,
    IMPORTED_TOPIC_ORDER, NEW_TOPIC_ORDER,
};
use crate::transfer::{ExportItem, ImportItem};
use crate::tree::TopicForest;

const USER_COLUMNS: &str = "id, username, password, title";
const TOPIC_COLUMNS: &str = "id, name, user_id, parent_id, sort_order";
const CARD_COLUMNS: &str = "id, category, front, back, user_id, topic_id";

/// Outcome of deleting a topic subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedSubtree {
    pub topics: usize,
    pub cards: u64,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a user together with the default topic.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        if fetch_user_by_name(&mut tx, username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists.".to_string()));
        }

        let id = sqlx::query("INSERT INTO users (username, password, title) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(DEFAULT_TITLE)
            .execute(&mut *tx)
            .await
            .map_err(|e| username_conflict(e, "Username already exists."))?
            .last_insert_rowid();

        insert_topic(&mut tx, id, DEFAULT_TOPIC_NAME, None, 0).await?;

        tx.commit().await?;

        tracing::info!("Registered user {} ({})", id, username);

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            title: DEFAULT_TITLE.to_string(),
        })
    }

    /// Find a user by username.
    pub async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user_by_name(&mut conn, username).await
    }

    /// Change the display title.
    pub async fn update_title(&self, user_id: i64, title: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET title = ? WHERE id = ?")
            .bind(title)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Change the username, refusing names held by someone else.
    pub async fn update_username(&self, user_id: i64, username: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = fetch_user_by_name(&mut tx, username).await? {
            if existing.id != user_id {
                return Err(AppError::Conflict("Username already taken.".to_string()));
            }
        }

        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| username_conflict(e, "Username already taken."))?;

        tx.commit().await?;
        Ok(())
    }

    /// Replace the stored password hash.
    pub async fn update_password_hash(&self, user_id: i64, hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== SESSION OPERATIONS ====================

    /// Open a session for a user and return its token.
    pub async fn create_session(&self, user_id: i64, ttl_hours: i64) -> Result<String, AppError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(now + Duration::hours(ttl_hours))
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub async fn user_for_session(&self, token: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            r#"SELECT u.id, u.username, u.password, u.title, s.expires_at
               FROM sessions s JOIN users u ON u.id = s.user_id
               WHERE s.token = ?"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: chrono::DateTime<Utc> = row.get("expires_at");
        if expires_at <= Utc::now() {
            tracing::debug!("Session for user {} expired", row.get::<i64, _>("id"));
            self.delete_session(token).await?;
            return Ok(None);
        }

        Ok(Some(user_from_row(&row)))
    }

    /// Close a session.
    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== TOPIC OPERATIONS ====================

    /// List a user's topics by order key.
    pub async fn list_topics(&self, user_id: i64) -> Result<Vec<Topic>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user_topics(&mut conn, user_id).await
    }

    /// Create a topic, placed after existing ones.
    pub async fn create_topic(
        &self,
        user_id: i64,
        request: &CreateTopicRequest,
    ) -> Result<Topic, AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = request.parent_id {
            if owned_topic_ref(&mut tx, user_id, parent_id).await?.is_none() {
                return Err(AppError::Validation("Invalid parent".to_string()));
            }
        }

        let name = request.name.trim();
        let id = insert_topic(&mut tx, user_id, name, request.parent_id, NEW_TOPIC_ORDER).await?;

        tx.commit().await?;

        Ok(Topic {
            id,
            name: name.to_string(),
            parent_id: request.parent_id,
            order: NEW_TOPIC_ORDER,
            user_id,
        })
    }

    /// Rename, reorder or reparent a topic.
    pub async fn update_topic(
        &self,
        user_id: i64,
        id: i64,
        request: &UpdateTopicRequest,
    ) -> Result<Topic, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = owned_topic(&mut tx, user_id, id).await?;

        let parent_id = match request.parent_id {
            None => existing.parent_id,
            Some(Some(parent)) if parent == id => {
                return Err(AppError::Validation("Cannot set parent to self".to_string()));
            }
            Some(Some(parent)) => {
                if owned_topic_ref(&mut tx, user_id, parent).await?.is_none() {
                    return Err(AppError::Validation("Invalid parent".to_string()));
                }
                let forest = TopicForest::new(&fetch_user_topics(&mut tx, user_id).await?);
                if forest.would_create_cycle(id, Some(parent)) {
                    return Err(AppError::Validation(
                        "Cannot move a topic beneath one of its own subtopics".to_string(),
                    ));
                }
                Some(parent)
            }
            Some(None) => None,
        };

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(existing.name.as_str())
            .to_string();
        let order = request.order.unwrap_or(existing.order);

        sqlx::query("UPDATE topics SET name = ?, sort_order = ?, parent_id = ? WHERE id = ?")
            .bind(&name)
            .bind(order)
            .bind(parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Topic {
            id,
            name,
            parent_id,
            order,
            user_id,
        })
    }

    /// Apply a batch of order/parent changes. Entries for topics the user does
    /// not own are skipped; a batch that would leave a cycle is rejected whole.
    pub async fn reorder_topics(
        &self,
        user_id: i64,
        entries: &[ReorderEntry],
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let topics = fetch_user_topics(&mut tx, user_id).await?;
        let owned: HashSet<i64> = topics.iter().map(|t| t.id).collect();
        let mut forest = TopicForest::new(&topics);
        let mut touched = Vec::new();

        for entry in entries {
            if !owned.contains(&entry.id) {
                continue;
            }

            if let Some(requested) = entry.parent_id {
                if requested != Some(entry.id) {
                    if let Some(parent) = requested {
                        if !owned.contains(&parent) {
                            return Err(AppError::Validation(format!(
                                "Invalid parent {} for topic {}",
                                parent, entry.id
                            )));
                        }
                    }
                    forest.set_parent(entry.id, requested);
                }
            }

            sqlx::query("UPDATE topics SET sort_order = ?, parent_id = ? WHERE id = ?")
                .bind(entry.order)
                .bind(forest.parent_of(entry.id))
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;

            touched.push(entry.id);
        }

        if let Some(id) = touched.iter().find(|&&id| forest.cycle_through(id)) {
            return Err(AppError::Validation(format!(
                "Reorder would make topic {} its own ancestor",
                id
            )));
        }

        tx.commit().await?;
        Ok(touched.len())
    }

    /// Delete a topic, its whole subtree and every card filed in it.
    pub async fn delete_topic(&self, user_id: i64, id: i64) -> Result<DeletedSubtree, AppError> {
        let mut tx = self.pool.begin().await?;

        owned_topic(&mut tx, user_id, id).await?;

        let forest = TopicForest::new(&fetch_user_topics(&mut tx, user_id).await?);
        let order = forest.deletion_order(id);

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM cards WHERE user_id = ");
        query.push_bind(user_id);
        push_scope_filter(&mut query, &order, false);
        let cards = query.build().execute(&mut *tx).await?.rows_affected();

        for topic_id in &order {
            sqlx::query("DELETE FROM topics WHERE id = ? AND user_id = ?")
                .bind(topic_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Deleted topic {} with {} topics and {} cards for user {}",
            id,
            order.len(),
            cards,
            user_id
        );

        Ok(DeletedSubtree {
            topics: order.len(),
            cards,
        })
    }

    // ==================== CARD OPERATIONS ====================

    /// List cards in the subtree of `topic_id`, or, without a topic, the cards in
    /// the default topic's subtree plus every card without a topic.
    pub async fn list_cards(
        &self,
        user_id: i64,
        topic_id: Option<i64>,
    ) -> Result<Vec<Card>, AppError> {
        let mut conn = self.pool.acquire().await?;

        let (root, include_orphans) = match topic_id {
            Some(id) => (Some(owned_topic(&mut conn, user_id, id).await?.id), false),
            None => (default_topic(&mut conn, user_id).await?.map(|t| t.id), true),
        };

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM cards WHERE user_id = ",
            CARD_COLUMNS
        ));
        query.push_bind(user_id);

        match root {
            Some(root) => {
                let forest = TopicForest::new(&fetch_user_topics(&mut conn, user_id).await?);
                push_scope_filter(&mut query, &forest.scope(root), include_orphans);
            }
            None => {
                query.push(" AND topic_id IS NULL");
            }
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&mut *conn).await?;
        Ok(rows.iter().map(card_from_row).collect())
    }

    /// Add a card. Without a topic it is filed under the default topic.
    pub async fn create_card(
        &self,
        user_id: i64,
        request: &CreateCardRequest,
    ) -> Result<Card, AppError> {
        let mut tx = self.pool.begin().await?;

        let topic_id = match request.topic_id {
            Some(topic_id) => {
                if owned_topic_ref(&mut tx, user_id, topic_id).await?.is_none() {
                    return Err(AppError::Forbidden("Invalid topic".to_string()));
                }
                Some(topic_id)
            }
            None => default_topic(&mut tx, user_id).await?.map(|t| t.id),
        };

        let card = NewCard {
            category: request
                .category
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            front: request.front.clone(),
            back: request.back.clone(),
            topic_id,
        };
        let id = insert_card(&mut tx, user_id, &card).await?;

        tx.commit().await?;

        Ok(Card {
            id,
            category: card.category,
            front: card.front,
            back: card.back,
            topic_id: card.topic_id,
            user_id,
        })
    }

    /// Update card fields. An explicit `topic_id: null` refiles the card under the
    /// default topic.
    pub async fn update_card(
        &self,
        user_id: i64,
        id: i64,
        request: &UpdateCardRequest,
    ) -> Result<Card, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = owned_card(&mut tx, user_id, id).await?;

        let topic_id = match request.topic_id {
            None => existing.topic_id,
            Some(None) => default_topic(&mut tx, user_id).await?.map(|t| t.id),
            Some(Some(topic_id)) => {
                if owned_topic_ref(&mut tx, user_id, topic_id).await?.is_none() {
                    return Err(AppError::Validation("Invalid topic".to_string()));
                }
                Some(topic_id)
            }
        };

        let card = Card {
            id,
            category: request.category.clone().unwrap_or(existing.category),
            front: request.front.clone().unwrap_or(existing.front),
            back: request.back.clone().unwrap_or(existing.back),
            topic_id,
            user_id,
        };

        sqlx::query("UPDATE cards SET category = ?, front = ?, back = ?, topic_id = ? WHERE id = ?")
            .bind(&card.category)
            .bind(&card.front)
            .bind(&card.back)
            .bind(card.topic_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(card)
    }

    /// Delete a card.
    pub async fn delete_card(&self, user_id: i64, id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        owned_card(&mut tx, user_id, id).await?;

        sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert imported cards, creating named topics as needed. Either every card
    /// is stored or none is.
    pub async fn import_cards(
        &self,
        user_id: i64,
        forced_topic_id: Option<i64>,
        items: &[ImportItem],
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(topic_id) = forced_topic_id {
            if owned_topic_ref(&mut tx, user_id, topic_id).await?.is_none() {
                return Err(AppError::Forbidden("Invalid topic".to_string()));
            }
        }

        let fallback = default_topic(&mut tx, user_id).await?.map(|t| t.id);
        let mut named: HashMap<String, i64> = HashMap::new();
        let mut created = 0usize;

        for item in items {
            let topic_id = match (forced_topic_id, item.topic.as_deref()) {
                (Some(forced), _) => Some(forced),
                (None, Some(name)) => {
                    if let Some(&id) = named.get(name) {
                        Some(id)
                    } else {
                        let id = match topic_by_name(&mut tx, user_id, name).await? {
                            Some(topic) => topic.id,
                            None => {
                                created += 1;
                                insert_topic(&mut tx, user_id, name, None, IMPORTED_TOPIC_ORDER)
                                    .await?
                            }
                        };
                        named.insert(name.to_string(), id);
                        Some(id)
                    }
                }
                (None, None) => fallback,
            };

            let card = NewCard {
                category: item.category.clone(),
                front: item.front.clone(),
                back: item.back.clone(),
                topic_id,
            };
            insert_card(&mut tx, user_id, &card).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Imported {} cards ({} new topics) for user {}",
            items.len(),
            created,
            user_id
        );

        Ok(items.len())
    }

    /// All of a user's cards with their topic names, for export.
    pub async fn export_cards(&self, user_id: i64) -> Result<Vec<ExportItem>, AppError> {
        let rows = sqlx::query(
            r#"SELECT c.category, c.front, c.back, t.name AS topic_name
               FROM cards c
               LEFT JOIN topics t ON t.id = c.topic_id AND t.user_id = c.user_id
               WHERE c.user_id = ?
               ORDER BY c.id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ExportItem {
                category: row.get("category"),
                front: row.get("front"),
                back: row.get("back"),
                topic: row.get("topic_name"),
            })
            .collect())
    }
}

// Queries shared by the operations above. They take a connection so they can run
// inside a caller's transaction.

/// Report a UNIQUE violation on `users.username` as a conflict.
fn username_conflict(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => err.into(),
    }
}

async fn fetch_user_by_name(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

async fn fetch_topic(conn: &mut SqliteConnection, id: i64) -> Result<Option<Topic>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(topic_from_row))
}

async fn fetch_user_topics(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Topic>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM topics WHERE user_id = ? ORDER BY sort_order, id",
        TOPIC_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(topic_from_row).collect())
}

/// The topic, if it exists and belongs to the user.
async fn owned_topic_ref(
    conn: &mut SqliteConnection,
    user_id: i64,
    id: i64,
) -> Result<Option<Topic>, AppError> {
    Ok(fetch_topic(conn, id)
        .await?
        .filter(|topic| topic.user_id == user_id))
}

/// The topic, or 404 when missing and 403 when someone else owns it.
async fn owned_topic(
    conn: &mut SqliteConnection,
    user_id: i64,
    id: i64,
) -> Result<Topic, AppError> {
    let topic = fetch_topic(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", id)))?;

    if topic.user_id != user_id {
        return Err(AppError::Forbidden("Unauthorized".to_string()));
    }
    Ok(topic)
}

async fn topic_by_name(
    conn: &mut SqliteConnection,
    user_id: i64,
    name: &str,
) -> Result<Option<Topic>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM topics WHERE user_id = ? AND name = ? ORDER BY id LIMIT 1",
        TOPIC_COLUMNS
    ))
    .bind(user_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(topic_from_row))
}

async fn default_topic(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Option<Topic>, AppError> {
    topic_by_name(conn, user_id, DEFAULT_TOPIC_NAME).await
}

async fn insert_topic(
    conn: &mut SqliteConnection,
    user_id: i64,
    name: &str,
    parent_id: Option<i64>,
    order: i64,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO topics (name, user_id, parent_id, sort_order) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(user_id)
    .bind(parent_id)
    .bind(order)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn fetch_card(conn: &mut SqliteConnection, id: i64) -> Result<Option<Card>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(card_from_row))
}

/// The card, or 404 when missing and 403 when someone else owns it.
async fn owned_card(conn: &mut SqliteConnection, user_id: i64, id: i64) -> Result<Card, AppError> {
    let card = fetch_card(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Card {} not found", id)))?;

    if card.user_id != user_id {
        return Err(AppError::Forbidden("Unauthorized".to_string()));
    }
    Ok(card)
}

async fn insert_card(
    conn: &mut SqliteConnection,
    user_id: i64,
    card: &NewCard,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO cards (category, front, back, user_id, topic_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&card.category)
    .bind(&card.front)
    .bind(&card.back)
    .bind(user_id)
    .bind(card.topic_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Append ` AND (topic_id IN (...) [OR topic_id IS NULL])`. `scope` is never
/// empty: it always holds at least the root topic.
fn push_scope_filter(query: &mut QueryBuilder<'_, Sqlite>, scope: &[i64], include_orphans: bool) {
    query.push(" AND (topic_id IN (");
    let mut ids = query.separated(", ");
    for id in scope {
        ids.push_bind(*id);
    }
    query.push(")");
    if include_orphans {
        query.push(" OR topic_id IS NULL");
    }
    query.push(")");
}

// Helper functions for row conversion

fn user_from_row(row: &SqliteRow) -> User {
    let title: Option<String> = row.get("title");
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password"),
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    }
}

fn topic_from_row(row: &SqliteRow) -> Topic {
    Topic {
        id: row.get("id"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        order: row.get("sort_order"),
        user_id: row.get("user_id"),
    }
}

fn card_from_row(row: &SqliteRow) -> Card {
    Card {
        id: row.get("id"),
        category: row.get("category"),
        front: row.get("front"),
        back: row.get("back"),
        topic_id: row.get("topic_id"),
        user_id: row.get("user_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    impl Repository {
        async fn get_topic(&self, id: i64) -> Result<Option<Topic>, AppError> {
            let mut conn = self.pool.acquire().await?;
            fetch_topic(&mut conn, id).await
        }

        async fn get_card(&self, id: i64) -> Result<Option<Card>, AppError> {
            let mut conn = self.pool.acquire().await?;
            fetch_card(&mut conn, id).await
        }
    }

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("repo.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    async fn topic(repo: &Repository, user_id: i64, name: &str, parent: Option<i64>) -> i64 {
        repo.create_topic(
            user_id,
            &CreateTopicRequest {
                name: name.to_string(),
                parent_id: parent,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn card(repo: &Repository, user_id: i64, front: &str, topic_id: Option<i64>) -> i64 {
        repo.create_card(
            user_id,
            &CreateCardRequest {
                category: None,
                front: front.to_string(),
                back: "back".to_string(),
                topic_id,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn fronts(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.front.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_user_adds_default_topic() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();

        let topics = repo.list_topics(user.id).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, DEFAULT_TOPIC_NAME);
        assert_eq!(topics[0].order, 0);

        let err = repo.create_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unique_violation_on_username_is_conflict() {
        let (repo, _dir) = repo().await;
        repo.create_user("alice", "hash").await.unwrap();

        let err = sqlx::query("INSERT INTO users (username, password, title) VALUES (?, ?, ?)")
            .bind("alice")
            .bind("hash")
            .bind(DEFAULT_TITLE)
            .execute(&repo.pool)
            .await
            .unwrap_err();
        let mapped = username_conflict(err, "Username already exists.");
        assert!(matches!(mapped, AppError::Conflict(ref msg) if msg == "Username already exists."));

        let other = sqlx::query("INSERT INTO missing_table VALUES (1)")
            .execute(&repo.pool)
            .await
            .unwrap_err();
        assert!(matches!(
            username_conflict(other, "Username already exists."),
            AppError::Database(_)
        ));
    }

    #[tokio::test]
    async fn test_scoped_listing_follows_subtree() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();

        let languages = topic(&repo, user.id, "Languages", None).await;
        let spanish = topic(&repo, user.id, "Spanish", Some(languages)).await;
        let verbs = topic(&repo, user.id, "Verbs", Some(spanish)).await;
        let math = topic(&repo, user.id, "Math", None).await;

        card(&repo, user.id, "hola", Some(spanish)).await;
        card(&repo, user.id, "ser", Some(verbs)).await;
        card(&repo, user.id, "pi", Some(math)).await;

        let scoped = repo.list_cards(user.id, Some(languages)).await.unwrap();
        assert_eq!(fronts(&scoped), vec!["hola", "ser"]);

        let leaf = repo.list_cards(user.id, Some(verbs)).await.unwrap();
        assert_eq!(fronts(&leaf), vec!["ser"]);
    }

    #[tokio::test]
    async fn test_unscoped_listing_uses_default_topic_and_orphans() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();
        let math = topic(&repo, user.id, "Math", None).await;

        card(&repo, user.id, "in-default", None).await;
        card(&repo, user.id, "in-math", Some(math)).await;
        sqlx::query("INSERT INTO cards (category, front, back, user_id, topic_id) VALUES ('General', 'orphan', 'x', ?, NULL)")
            .bind(user.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let listed = repo.list_cards(user.id, None).await.unwrap();
        assert_eq!(fronts(&listed), vec!["in-default", "orphan"]);
    }

    #[tokio::test]
    async fn test_listing_without_default_topic_returns_orphans() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();
        let default_id = repo.list_topics(user.id).await.unwrap()[0].id;
        let math = topic(&repo, user.id, "Math", None).await;

        card(&repo, user.id, "in-math", Some(math)).await;
        repo.delete_topic(user.id, default_id).await.unwrap();
        card(&repo, user.id, "orphan", None).await;

        let listed = repo.list_cards(user.id, None).await.unwrap();
        assert_eq!(fronts(&listed), vec!["orphan"]);
        assert_eq!(listed[0].topic_id, None);
    }

    #[tokio::test]
    async fn test_delete_topic_cascades() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();

        let root = topic(&repo, user.id, "Root", None).await;
        let child = topic(&repo, user.id, "Child", Some(root)).await;
        let grandchild = topic(&repo, user.id, "Grandchild", Some(child)).await;
        let other = topic(&repo, user.id, "Other", None).await;

        card(&repo, user.id, "a", Some(root)).await;
        card(&repo, user.id, "b", Some(grandchild)).await;
        let kept = card(&repo, user.id, "c", Some(other)).await;

        let deleted = repo.delete_topic(user.id, root).await.unwrap();
        assert_eq!(deleted, DeletedSubtree { topics: 3, cards: 2 });

        for id in [root, child, grandchild] {
            assert!(repo.get_topic(id).await.unwrap().is_none());
        }
        assert!(repo.get_card(kept).await.unwrap().is_some());
        assert!(repo.get_topic(other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_self_and_descendant_parent() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();
        let root = topic(&repo, user.id, "Root", None).await;
        let child = topic(&repo, user.id, "Child", Some(root)).await;

        let to_self = UpdateTopicRequest {
            parent_id: Some(Some(root)),
            ..Default::default()
        };
        let err = repo.update_topic(user.id, root, &to_self).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let to_child = UpdateTopicRequest {
            parent_id: Some(Some(child)),
            ..Default::default()
        };
        let err = repo.update_topic(user.id, root, &to_child).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(repo.get_topic(root).await.unwrap().unwrap().parent_id, None);
    }

    #[tokio::test]
    async fn test_reorder_skips_foreign_and_rejects_cycles() {
        let (repo, _dir) = repo().await;
        let alice = repo.create_user("alice", "hash").await.unwrap();
        let bob = repo.create_user("bob", "hash").await.unwrap();

        let a = topic(&repo, alice.id, "A", None).await;
        let b = topic(&repo, alice.id, "B", Some(a)).await;
        let bobs = topic(&repo, bob.id, "Bob's", None).await;

        let applied = repo
            .reorder_topics(
                alice.id,
                &[
                    ReorderEntry { id: b, order: 1, parent_id: Some(None) },
                    ReorderEntry { id: a, order: 2, parent_id: Some(Some(a)) },
                    ReorderEntry { id: bobs, order: 5, parent_id: None },
                ],
            )
            .await
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(repo.get_topic(b).await.unwrap().unwrap().parent_id, None);
        assert_eq!(repo.get_topic(a).await.unwrap().unwrap().order, 2);
        assert_eq!(repo.get_topic(bobs).await.unwrap().unwrap().order, NEW_TOPIC_ORDER);

        let err = repo
            .reorder_topics(
                alice.id,
                &[
                    ReorderEntry { id: a, order: 0, parent_id: Some(Some(b)) },
                    ReorderEntry { id: b, order: 0, parent_id: Some(Some(a)) },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(repo.get_topic(a).await.unwrap().unwrap().parent_id, None);
        assert_eq!(repo.get_topic(a).await.unwrap().unwrap().order, 2);
    }

    #[tokio::test]
    async fn test_import_creates_named_topics_once() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();

        let items: Vec<ImportItem> = ["uno", "dos"]
            .iter()
            .map(|front| ImportItem {
                category: "Imported".to_string(),
                front: front.to_string(),
                back: "x".to_string(),
                topic: Some("Spanish".to_string()),
            })
            .collect();

        assert_eq!(repo.import_cards(user.id, None, &items).await.unwrap(), 2);

        let topics = repo.list_topics(user.id).await.unwrap();
        let spanish: Vec<&Topic> = topics.iter().filter(|t| t.name == "Spanish").collect();
        assert_eq!(spanish.len(), 1);
        assert_eq!(spanish[0].order, IMPORTED_TOPIC_ORDER);

        let cards = repo.list_cards(user.id, Some(spanish[0].id)).await.unwrap();
        assert_eq!(cards.len(), 2);
    }

    #[tokio::test]
    async fn test_import_into_foreign_topic_writes_nothing() {
        let (repo, _dir) = repo().await;
        let alice = repo.create_user("alice", "hash").await.unwrap();
        let bob = repo.create_user("bob", "hash").await.unwrap();
        let bobs = topic(&repo, bob.id, "Bob's", None).await;

        let items = vec![ImportItem {
            category: "Imported".to_string(),
            front: "q".to_string(),
            back: "a".to_string(),
            topic: None,
        }];
        let err = repo
            .import_cards(alice.id, Some(bobs), &items)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(repo.export_cards(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_rolls_back_after_partial_write() {
        let (repo, _dir) = repo().await;
        let alice = repo.create_user("alice", "hash").await.unwrap();

        sqlx::query(
            r#"CREATE TRIGGER reject_boom BEFORE INSERT ON cards
               WHEN NEW.front = 'boom'
               BEGIN SELECT RAISE(ABORT, 'boom'); END"#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let item = |front: &str, topic: Option<&str>| ImportItem {
            category: "Imported".to_string(),
            front: front.to_string(),
            back: "a".to_string(),
            topic: topic.map(str::to_string),
        };
        let items = vec![item("ok", Some("Spanish")), item("boom", None)];

        let err = repo.import_cards(alice.id, None, &items).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let topics = repo.list_topics(alice.id).await.unwrap();
        assert!(topics.iter().all(|t| t.name != "Spanish"));
        assert_eq!(topics.len(), 1);
        assert!(repo.export_cards(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let (repo, _dir) = repo().await;
        let user = repo.create_user("alice", "hash").await.unwrap();

        let live = repo.create_session(user.id, 1).await.unwrap();
        assert_eq!(
            repo.user_for_session(&live).await.unwrap().map(|u| u.id),
            Some(user.id)
        );

        let expired = repo.create_session(user.id, -1).await.unwrap();
        assert!(repo.user_for_session(&expired).await.unwrap().is_none());

        repo.delete_session(&live).await.unwrap();
        assert!(repo.user_for_session(&live).await.unwrap().is_none());
    }
}
