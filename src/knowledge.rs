//! Builds knowledge entries for a document's chunks and writes them as one batch.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{ChunkMetadata, KnowledgeEntry};
use crate::store::KnowledgeStore;

/// Metadata shared by every chunk of one ingestion.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub source: String,
    pub filename: String,
    pub kind: String,
    pub document_record_id: Option<String>,
}

impl ChunkContext {
    /// `source` is `<scheme>://<bucket>/<path>`, `filename` the last path segment.
    pub fn for_object(
        scheme: &str,
        bucket: &str,
        path: &str,
        kind: &str,
        document_record_id: Option<String>,
    ) -> Self {
        Self {
            source: format!("{}://{}/{}", scheme, bucket, path),
            filename: path.rsplit('/').next().unwrap_or(path).to_string(),
            kind: kind.to_string(),
            document_record_id,
        }
    }
}

/// ISO-8601 UTC timestamp with a trailing `Z`.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct KnowledgeWriter {
    store: Arc<dyn KnowledgeStore>,
    max_batch_entries: Option<usize>,
}

impl KnowledgeWriter {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            max_batch_entries: None,
        }
    }

    pub fn with_max_batch_entries(mut self, max: Option<usize>) -> Self {
        self.max_batch_entries = max;
        self
    }

    /// Give each chunk a fresh id and the shared metadata.
    pub fn build_entries(&self, chunks: &[&str], ctx: &ChunkContext) -> Vec<KnowledgeEntry> {
        let timestamp = utc_timestamp();
        chunks
            .iter()
            .map(|text| KnowledgeEntry {
                id: Uuid::new_v4().to_string(),
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: ctx.source.clone(),
                    filename: ctx.filename.clone(),
                    timestamp: timestamp.clone(),
                    kind: ctx.kind.clone(),
                    document_record_id: ctx.document_record_id.clone(),
                },
            })
            .collect()
    }

    /// Persist `chunks` in one batch. No retry on failure.
    pub async fn write_batch(
        &self,
        chunks: &[&str],
        ctx: &ChunkContext,
    ) -> Result<Vec<KnowledgeEntry>, IngestError> {
        if let Some(max) = self.max_batch_entries {
            if chunks.len() > max {
                return Err(IngestError::Write(format!(
                    "batch of {} entries exceeds limit of {}",
                    chunks.len(),
                    max
                )));
            }
        }

        let entries = self.build_entries(chunks, ctx);
        self.store
            .write_batch(&entries)
            .await
            .map_err(|e| IngestError::Write(format!("{:#}", e)))?;

        tracing::debug!(count = entries.len(), source = %ctx.source, "knowledge batch written");
        Ok(entries)
    }
}
