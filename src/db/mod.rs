//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for users, sessions, topics and cards.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Create missing tables and bring older databases up to date.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            title TEXT DEFAULT 'My Flashcards'
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            parent_id INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            topic_id INTEGER
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before titles and topics existed
    ensure_column(pool, "users", "title", "TEXT DEFAULT 'My Flashcards'").await?;
    ensure_column(pool, "cards", "topic_id", "INTEGER").await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_topics_user ON topics(user_id);
        CREATE INDEX IF NOT EXISTS idx_topics_parent ON topics(parent_id);
        CREATE INDEX IF NOT EXISTS idx_cards_user_topic ON cards(user_id, topic_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Add `column` to `table` unless it is already there.
async fn ensure_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<(), sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await?;

    if !columns.iter().any(|c| c == column) {
        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column, definition
        ))
        .execute(pool)
        .await?;
        tracing::info!("Added '{}' column to {} table", column, table);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_migrates_legacy_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("legacy.sqlite");

        {
            let pool = init_database(&db_path).await.unwrap();
            sqlx::query("DROP TABLE cards").execute(&pool).await.unwrap();
            sqlx::query(
                "CREATE TABLE cards (id INTEGER PRIMARY KEY AUTOINCREMENT, category TEXT NOT NULL, front TEXT NOT NULL, back TEXT NOT NULL, user_id INTEGER NOT NULL)",
            )
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;
        }

        let pool = init_database(&db_path).await.unwrap();
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('cards')")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert!(columns.iter().any(|c| c == "topic_id"));
    }
}
