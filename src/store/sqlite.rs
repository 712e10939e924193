//! SQLite-backed [`KnowledgeStore`] and [`StatusStore`].
//!
//! Both stores share one database: `resources` holds document status
//! records, `knowledge` holds chunks. See [`crate::migrate`] for the schema.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::{
    ChunkMetadata, DocumentRecord, FieldUpdate, KnowledgeEntry, ServerTimestamp, StatusUpdate,
};

use super::{KnowledgeStore, StatusStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("timestamp out of range: {}", ts))
}

fn record_from_row(row: &SqliteRow) -> Result<DocumentRecord> {
    let status: String = row.try_get("rag_status")?;
    let processed_at: Option<i64> = row.try_get("processed_at")?;
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        storage_path: row.try_get("storage_path")?,
        title: row.try_get("title")?,
        rag_status: status.parse()?,
        rag_error: row.try_get("rag_error")?,
        chunk_count: row.try_get("chunk_count")?,
        processed_at: processed_at.map(from_ts).transpose()?,
        created_at: from_ts(row.try_get("created_at")?)?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<KnowledgeEntry> {
    Ok(KnowledgeEntry {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        metadata: ChunkMetadata {
            source: row.try_get("source")?,
            filename: row.try_get("filename")?,
            timestamp: row.try_get("timestamp")?,
            kind: row.try_get("type")?,
            document_record_id: row.try_get("document_record_id")?,
        },
    })
}

const RECORD_COLUMNS: &str =
    "id, storage_path, title, rag_status, rag_error, chunk_count, processed_at, created_at";
const ENTRY_COLUMNS: &str = "id, text, source, filename, timestamp, type, document_record_id";

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn write_batch(&self, entries: &[KnowledgeEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO knowledge (id, text, source, filename, timestamp, type, document_record_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(&entry.metadata.source)
            .bind(&entry.metadata.filename)
            .bind(&entry.metadata.timestamp)
            .bind(&entry.metadata.kind)
            .bind(&entry.metadata.document_record_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting knowledge entry {}", entry.id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn entries_for_record(&self, record_id: &str) -> Result<Vec<KnowledgeEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM knowledge WHERE document_record_id = ? ORDER BY seq",
            ENTRY_COLUMNS
        ))
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn entries_by_source(&self, source: &str) -> Result<Vec<KnowledgeEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM knowledge WHERE source = ? ORDER BY seq",
            ENTRY_COLUMNS
        ))
        .bind(source)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl StatusStore for SqliteStore {
    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM resources WHERE storage_path = ? ORDER BY rowid",
            RECORD_COLUMNS
        ))
        .bind(storage_path)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM resources WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, storage_path, title, rag_status, rag_error,
                                   chunk_count, processed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.storage_path)
        .bind(&record.title)
        .bind(record.rag_status.as_str())
        .bind(&record.rag_error)
        .bind(record.chunk_count)
        .bind(record.processed_at.map(|t| t.timestamp()))
        .bind(record.created_at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting document record {}", record.id))?;
        Ok(())
    }

    async fn apply_update(&self, id: &str, update: StatusUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE resources SET ");
        let mut sets = qb.separated(", ");

        if let Some(status) = update.rag_status {
            sets.push("rag_status = ").push_bind_unseparated(status.as_str());
        }
        match update.rag_error {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(message) => {
                sets.push("rag_error = ").push_bind_unseparated(message);
            }
            FieldUpdate::Clear => {
                sets.push("rag_error = NULL");
            }
        }
        match update.chunk_count {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(count) => {
                sets.push("chunk_count = ").push_bind_unseparated(count);
            }
            FieldUpdate::Clear => {
                sets.push("chunk_count = NULL");
            }
        }
        match update.processed_at {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(ServerTimestamp) => {
                sets.push("processed_at = ")
                    .push_bind_unseparated(Utc::now().timestamp());
            }
            FieldUpdate::Clear => {
                sets.push("processed_at = NULL");
            }
        }

        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            bail!("document record {} not found", id);
        }
        Ok(())
    }
}
