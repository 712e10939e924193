//! Storage abstraction for the ingestion pipeline.
//!
//! Two stores sit behind the pipeline:
//!
//! | Trait | Holds | Write pattern |
//! |-------|-------|---------------|
//! | [`KnowledgeStore`] | chunk text + metadata | additive batch inserts, never deletes |
//! | [`StatusStore`] | one [`DocumentRecord`] per upload | partial updates of tracked fields |
//!
//! [`SqliteStore`](sqlite::SqliteStore) implements both against one
//! database file; [`InMemoryStore`](memory::InMemoryStore) implements both
//! for tests. Implementations must be `Send + Sync`.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentRecord, KnowledgeEntry, StatusUpdate};

/// Flat, append-only store of knowledge chunks keyed by generated id.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persist every entry in one logical batch.
    ///
    /// Entries are merged into existing content; nothing already stored is
    /// replaced or removed. Either the whole batch lands or none of it does.
    async fn write_batch(&self, entries: &[KnowledgeEntry]) -> Result<()>;

    /// Total number of stored entries.
    async fn count(&self) -> Result<usize>;

    /// Entries whose metadata references `record_id`, in write order.
    async fn entries_for_record(&self, record_id: &str) -> Result<Vec<KnowledgeEntry>>;

    /// Entries whose metadata `source` equals `source`, in write order.
    async fn entries_by_source(&self, source: &str) -> Result<Vec<KnowledgeEntry>>;
}

/// Document status records, found by exact match on storage path.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// All records whose `storage_path` equals `storage_path`, in store order.
    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Vec<DocumentRecord>>;

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Create a record. Fails if the id already exists.
    async fn insert(&self, record: &DocumentRecord) -> Result<()>;

    /// Apply a partial update to the tracked fields of record `id`.
    ///
    /// Fails if no record with that id exists.
    async fn apply_update(&self, id: &str, update: StatusUpdate) -> Result<()>;
}
