use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;

use shared::{
    domain::ExerciseId,
    protocol::{CursorPosition, SelectionRange},
};

/// Device-local draft store, the save of last resort.
///
/// Drafts live in a single key-value table: one row per exercise, keyed
/// `exercise_{id}_draft`, value a JSON document. Writes overwrite in place;
/// there is no history.
#[derive(Clone)]
pub struct DraftStore {
    pool: Pool<Sqlite>,
}

/// The latest locally persisted snapshot of editor content, independent of
/// remote confirmation. Serialized field names follow the page contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionRange>,
}

impl Draft {
    pub fn new(code: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            timestamp,
            cursor_position: None,
            selection: None,
        }
    }
}

pub fn draft_key(exercise_id: ExerciseId) -> String {
    format!("exercise_{}_draft", exercise_id.0)
}

impl DraftStore {
    pub async fn open(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let store = Self { pool };
        store.ensure_drafts_table().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_drafts_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure drafts table exists")?;
        Ok(())
    }

    /// Persist the draft for an exercise, overwriting any previous one.
    pub async fn save_draft(&self, exercise_id: ExerciseId, draft: &Draft) -> Result<()> {
        let value = serde_json::to_string(draft).context("failed to encode draft")?;
        sqlx::query(
            "INSERT INTO drafts (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(draft_key(exercise_id))
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the persisted draft for an exercise.
    ///
    /// A corrupt entry is discarded and `None` is returned; parse failures
    /// never propagate to the caller.
    pub async fn load_draft(&self, exercise_id: ExerciseId) -> Result<Option<Draft>> {
        let key = draft_key(exercise_id);
        let row = sqlx::query("SELECT value FROM drafts WHERE key = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get(0);
        match serde_json::from_str::<Draft>(&raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(err) => {
                warn!("discarding corrupt draft entry key={key}: {err}");
                self.clear_draft(exercise_id).await?;
                Ok(None)
            }
        }
    }

    pub async fn clear_draft(&self, exercise_id: ExerciseId) -> Result<()> {
        sqlx::query("DELETE FROM drafts WHERE key = ?")
            .bind(draft_key(exercise_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
