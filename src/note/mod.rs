/// Per-account note storage
use crate::{
    db::note::Note,
    error::{NoteError, NoteResult},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Create/update note body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
    pub content: Option<String>,
}

/// Note store
#[derive(Clone)]
pub struct NoteStore {
    db: SqlitePool,
}

impl NoteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Notes of one account, newest first
    pub async fn list(&self, account_id: &str) -> NoteResult<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            "SELECT id, account_id, content, created_at, updated_at
             FROM note WHERE account_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(notes)
    }

    pub async fn create(&self, account_id: &str, content: Option<&str>) -> NoteResult<Note> {
        let content = require_content(content)?;
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            content,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO note (id, account_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&note.id)
        .bind(&note.account_id)
        .bind(&note.content)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!("Created note {} for account {}", note.id, account_id);
        Ok(note)
    }

    /// Replace the content of a note owned by `account_id`
    pub async fn update(
        &self,
        account_id: &str,
        id: &str,
        content: Option<&str>,
    ) -> NoteResult<Note> {
        let content = require_content(content)?;

        let note = sqlx::query_as::<_, Note>(
            "UPDATE note SET content = ?1, updated_at = ?2
             WHERE id = ?3 AND account_id = ?4
             RETURNING id, account_id, content, created_at, updated_at",
        )
        .bind(&content)
        .bind(Utc::now())
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(note_not_found)?;

        Ok(note)
    }

    /// Delete a note owned by `account_id`
    pub async fn delete(&self, account_id: &str, id: &str) -> NoteResult<()> {
        let result = sqlx::query("DELETE FROM note WHERE id = ?1 AND account_id = ?2")
            .bind(id)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(note_not_found());
        }

        Ok(())
    }
}

fn require_content(content: Option<&str>) -> NoteResult<String> {
    match content {
        Some(c) if !c.trim().is_empty() => Ok(c.to_string()),
        _ => Err(NoteError::Validation("Content required".to_string())),
    }
}

fn note_not_found() -> NoteError {
    NoteError::NotFound("Note not found".to_string())
}
