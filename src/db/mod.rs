/// Database layer for Notekeep
///
/// Manages the SQLite connection pool, embedded migrations and the row
/// types for accounts and notes.

pub mod account;
pub mod note;

use crate::error::{NoteError, NoteResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> NoteResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Single-connection in-memory pool with migrations applied.
///
/// The connection is never recycled, since dropping it would drop the database.
pub async fn create_memory_pool() -> NoteResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(
            SqliteConnectOptions::new()
                .in_memory(true)
                .foreign_keys(true),
        )
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> NoteResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| NoteError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> NoteResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// True when the error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_pool_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();

        assert!(path.exists());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_challenge_columns_set_together() {
        let pool = create_memory_pool().await.unwrap();
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (id, email, otp, otp_expires_at, created_at, updated_at)
             VALUES ('a', 'a@x.com', '123456', NULL, ?1, ?1)",
        )
        .bind(now)
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = create_memory_pool().await.unwrap();
        let now = chrono::Utc::now();
        let insert = "INSERT INTO account (id, email, created_at, updated_at) VALUES (?1, 'a@x.com', ?2, ?2)";

        sqlx::query(insert).bind("a").bind(now).execute(&pool).await.unwrap();
        let err = sqlx::query(insert)
            .bind("b")
            .bind(now)
            .execute(&pool)
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }
}
