//! Translation history — append-only, newest first, bulk clear only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

/// One completed translation. Immutable once written; rows only ever
/// leave the table through `clear_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub id: String,
    pub source_language: String,
    pub target_language: String,
    pub source_text: String,
    pub translated_text: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl TranslationRecord {
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            confidence,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    source_language: String,
    target_language: String,
    source_text: String,
    translated_text: String,
    confidence: f64,
    created_at: String,
}

impl From<RecordRow> for TranslationRecord {
    fn from(row: RecordRow) -> Self {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        Self {
            id: row.id,
            source_language: row.source_language,
            target_language: row.target_language,
            source_text: row.source_text,
            translated_text: row.translated_text,
            confidence: row.confidence,
            created_at,
        }
    }
}

#[derive(Clone)]
pub struct HistoryStore {
    db: SqlitePool,
}

impl HistoryStore {
    /// Open (creating if missing) the database at `database_url` and make
    /// sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(HistoryError::Database)?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { db };
        store.init().await?;
        Ok(store)
    }

    pub async fn with_pool(db: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { db };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), HistoryError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                id TEXT PRIMARY KEY,
                source_language TEXT NOT NULL,
                target_language TEXT NOT NULL,
                source_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn append(&self, record: &TranslationRecord) -> Result<(), HistoryError> {
        sqlx::query(
            "INSERT INTO translations
                (id, source_language, target_language, source_text, translated_text, confidence, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.source_language)
        .bind(&record.target_language)
        .bind(&record.source_text)
        .bind(&record.translated_text)
        .bind(record.confidence)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Most recent first.
    pub async fn list(&self, limit: i64) -> Result<Vec<TranslationRecord>, HistoryError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, source_language, target_language, source_text, translated_text,
                    confidence, created_at
             FROM translations
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(TranslationRecord::from).collect())
    }

    pub async fn clear_all(&self) -> Result<u64, HistoryError> {
        let result = sqlx::query("DELETE FROM translations")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
