//! In-memory store for tests and dry runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Records keep insertion order so
//! "first match" lookups are deterministic.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{DocumentRecord, KnowledgeEntry, StatusUpdate};

use super::{KnowledgeStore, StatusStore};

/// In-memory implementation of both [`KnowledgeStore`] and [`StatusStore`].
pub struct InMemoryStore {
    records: RwLock<Vec<DocumentRecord>>,
    knowledge: RwLock<Vec<KnowledgeEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            knowledge: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every stored knowledge entry, in write order.
    pub fn knowledge_snapshot(&self) -> Result<Vec<KnowledgeEntry>> {
        let guard = self.knowledge.read().map_err(|_| poisoned())?;
        Ok(guard.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn write_batch(&self, entries: &[KnowledgeEntry]) -> Result<()> {
        let mut stored = self.knowledge.write().map_err(|_| poisoned())?;
        if let Some(dup) = entries
            .iter()
            .find(|e| stored.iter().any(|s| s.id == e.id))
        {
            bail!("knowledge entry {} already exists", dup.id);
        }
        stored.extend(entries.iter().cloned());
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.knowledge.read().map_err(|_| poisoned())?.len())
    }

    async fn entries_for_record(&self, record_id: &str) -> Result<Vec<KnowledgeEntry>> {
        let stored = self.knowledge.read().map_err(|_| poisoned())?;
        Ok(stored
            .iter()
            .filter(|e| e.metadata.document_record_id.as_deref() == Some(record_id))
            .cloned()
            .collect())
    }

    async fn entries_by_source(&self, source: &str) -> Result<Vec<KnowledgeEntry>> {
        let stored = self.knowledge.read().map_err(|_| poisoned())?;
        Ok(stored
            .iter()
            .filter(|e| e.metadata.source == source)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StatusStore for InMemoryStore {
    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Vec<DocumentRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| r.storage_path == storage_path)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.iter().any(|r| r.id == record.id) {
            bail!("document record {} already exists", record.id);
        }
        records.push(record.clone());
        Ok(())
    }

    async fn apply_update(&self, id: &str, update: StatusUpdate) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("document record {} not found", id))?;
        update.apply_to(record, Utc::now());
        Ok(())
    }
}
