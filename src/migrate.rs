use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index if missing. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Document status records. storage_path is deliberately not UNIQUE:
    // duplicates are tolerated and resolved by taking the first match.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            storage_path TEXT NOT NULL,
            title TEXT,
            rag_status TEXT NOT NULL DEFAULT 'pending',
            rag_error TEXT,
            chunk_count INTEGER,
            processed_at INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Knowledge chunks. seq preserves write order across batches.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            filename TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            type TEXT NOT NULL,
            document_record_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_storage_path ON resources(storage_path)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_knowledge_record ON knowledge(document_record_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_source ON knowledge(source)")
        .execute(pool)
        .await?;

    Ok(())
}
