//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the upload events, document status records, and
//! knowledge chunks that flow between the pipeline and its stores.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification that an object finished uploading to a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub bucket: String,
    /// Object path inside the bucket (e.g. `resources/algebra.pdf`).
    pub name: String,
    #[serde(default, alias = "content_type")]
    pub content_type: Option<String>,
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Last path segment of the object name.
    pub fn filename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Processing state of a document's knowledge ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl RagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagStatus::Pending => "pending",
            RagStatus::Processing => "processing",
            RagStatus::Ready => "ready",
            RagStatus::Error => "error",
        }
    }
}

impl fmt::Display for RagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RagStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RagStatus::Pending),
            "processing" => Ok(RagStatus::Processing),
            "ready" => Ok(RagStatus::Ready),
            "error" => Ok(RagStatus::Error),
            other => anyhow::bail!("unknown rag status: '{}'", other),
        }
    }
}

/// Per-document status record, owned by the status store.
///
/// `title` and `created_at` belong to other flows; the pipeline only ever
/// touches the `rag_*`, `chunk_count` and `processed_at` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub storage_path: String,
    pub title: Option<String>,
    pub rag_status: RagStatus,
    pub rag_error: Option<String>,
    pub chunk_count: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A freshly registered record awaiting ingestion.
    pub fn pending(id: impl Into<String>, storage_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            storage_path: storage_path.into(),
            title: None,
            rag_status: RagStatus::Pending,
            rag_error: None,
            chunk_count: None,
            processed_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Handle to a located [`DocumentRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
}

/// One field of a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the stored value untouched.
    Keep,
    Set(T),
    /// Remove the stored value.
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    /// Apply this update to an optional value in place.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(v) => *slot = Some(v),
            FieldUpdate::Clear => *slot = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

/// Placeholder for a timestamp assigned by the store when the update lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimestamp;

/// Typed partial update of the tracked fields of a [`DocumentRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub rag_status: Option<RagStatus>,
    pub rag_error: FieldUpdate<String>,
    pub chunk_count: FieldUpdate<i64>,
    pub processed_at: FieldUpdate<ServerTimestamp>,
}

impl StatusUpdate {
    pub fn processing() -> Self {
        Self {
            rag_status: Some(RagStatus::Processing),
            rag_error: FieldUpdate::Clear,
            chunk_count: FieldUpdate::Clear,
            processed_at: FieldUpdate::Clear,
        }
    }

    pub fn ready(chunk_count: i64) -> Self {
        Self {
            rag_status: Some(RagStatus::Ready),
            rag_error: FieldUpdate::Clear,
            chunk_count: FieldUpdate::Set(chunk_count),
            processed_at: FieldUpdate::Set(ServerTimestamp),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            rag_status: Some(RagStatus::Error),
            rag_error: FieldUpdate::Set(message.into()),
            chunk_count: FieldUpdate::Clear,
            processed_at: FieldUpdate::Clear,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rag_status.is_none()
            && self.rag_error.is_keep()
            && self.chunk_count.is_keep()
            && self.processed_at.is_keep()
    }

    /// Apply to an in-memory record, resolving [`ServerTimestamp`] to `now`.
    pub fn apply_to(self, record: &mut DocumentRecord, now: DateTime<Utc>) {
        if let Some(status) = self.rag_status {
            record.rag_status = status;
        }
        self.rag_error.apply_to(&mut record.rag_error);
        self.chunk_count.apply_to(&mut record.chunk_count);
        match self.processed_at {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(ServerTimestamp) => record.processed_at = Some(now),
            FieldUpdate::Clear => record.processed_at = None,
        }
    }
}

/// Metadata attached to every knowledge chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// `<scheme>://<bucket>/<path>` of the originating object.
    pub source: String,
    pub filename: String,
    /// ISO-8601 UTC with trailing `Z`.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub document_record_id: Option<String>,
}

/// A chunk of document text as stored in the knowledge store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(skip)]
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}
