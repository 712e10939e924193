//! Ingestion pipeline orchestration.
//!
//! Coordinates one upload end to end: intake filter → status lookup →
//! object fetch → text extraction → chunking → knowledge write → status.
//!
//! # Status transitions
//!
//! ```text
//!  filter rejects ──▶ Skipped            (no store access at all)
//!  accepted ──▶ processing ──▶ ready     (chunks written)
//!                         └──▶ error     (any failure after the filter)
//! ```
//!
//! Every failure raised after the filter is funnelled into one exit path in
//! [`IngestionPipeline::handle`], which makes a best-effort `error` status
//! write. If that write fails too, the failure is logged and dropped. There
//! is no retry; a document is only re-ingested when its upload event is
//! delivered again, and a repeated delivery produces a second, independent
//! set of chunks.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::chunk::ChunkPolicy;
use crate::config::{Config, IntakeConfig};
use crate::error::{ExtractionError, IngestError};
use crate::extract::{ContentKind, TextExtractor};
use crate::knowledge::{ChunkContext, KnowledgeWriter};
use crate::models::{DocumentRef, UploadEvent};
use crate::object_store::ObjectSource;
use crate::status::StatusTracker;
use crate::store::{KnowledgeStore, StatusStore};

/// Why an event was ignored by the intake filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutsideIntake,
    UnsupportedExtension,
}

/// Result of handling one upload event.
#[derive(Debug)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Ingested {
        chunk_count: usize,
        document_record_id: Option<String>,
    },
    Failed {
        error: IngestError,
        document_record_id: Option<String>,
    },
}

impl IngestOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, IngestOutcome::Skipped(_))
    }
}

/// Totals for a sequence of handled events.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub skipped: usize,
    pub ingested: usize,
    pub failed: usize,
    pub chunks_written: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Skipped(_) => self.skipped += 1,
            IngestOutcome::Ingested { chunk_count, .. } => {
                self.ingested += 1;
                self.chunks_written += chunk_count;
            }
            IngestOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Decide whether `path` belongs to the intake. Case-sensitive on the
/// prefix, case-insensitive on the extension.
pub fn check_intake(intake: &IntakeConfig, path: &str) -> Result<(), SkipReason> {
    if !path.starts_with(&intake.prefix) {
        return Err(SkipReason::OutsideIntake);
    }
    let lower = path.to_lowercase();
    let supported = intake
        .extensions
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext.trim_start_matches('.').to_lowercase())));
    if !supported {
        return Err(SkipReason::UnsupportedExtension);
    }
    Ok(())
}

pub struct IngestionPipeline {
    config: Arc<Config>,
    objects: Arc<dyn ObjectSource>,
    extractor: Arc<dyn TextExtractor>,
    knowledge: KnowledgeWriter,
    status: StatusTracker,
}

impl IngestionPipeline {
    pub fn new(
        config: Arc<Config>,
        objects: Arc<dyn ObjectSource>,
        extractor: Arc<dyn TextExtractor>,
        knowledge_store: Arc<dyn KnowledgeStore>,
        status_store: Arc<dyn StatusStore>,
    ) -> Self {
        let knowledge = KnowledgeWriter::new(knowledge_store)
            .with_max_batch_entries(config.knowledge.max_batch_entries);
        Self {
            config,
            objects,
            extractor,
            knowledge,
            status: StatusTracker::new(status_store),
        }
    }

    fn policy(&self) -> ChunkPolicy {
        self.config.chunking.policy()
    }

    /// Handle one upload event. Never returns an error: failures are
    /// reported through the outcome and the document's status record.
    pub async fn handle(&self, event: &UploadEvent) -> IngestOutcome {
        let span = tracing::info_span!("ingest", bucket = %event.bucket, path = %event.name);
        self.handle_inner(event).instrument(span).await
    }

    async fn handle_inner(&self, event: &UploadEvent) -> IngestOutcome {
        if let Err(reason) = check_intake(&self.config.intake, &event.name) {
            tracing::info!(?reason, "skipping upload");
            return IngestOutcome::Skipped(reason);
        }

        tracing::info!(content_type = ?event.content_type, "processing upload");

        let doc = match self.status.locate(&event.name).await {
            Ok(Some(doc)) => Some(doc),
            Ok(None) => {
                tracing::warn!("no document record found; ingesting without status tracking");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "document record lookup failed; ingesting without status tracking");
                None
            }
        };
        let document_record_id = doc.as_ref().map(|d| d.id.clone());

        match self.ingest(event, doc.as_ref()).await {
            Ok(chunk_count) => {
                if let Err(e) = self.status.mark_ready(doc.as_ref(), chunk_count).await {
                    tracing::error!(error = %e, "chunks written but ready status could not be recorded");
                } else if doc.is_some() {
                    tracing::info!("status updated to ready");
                }
                tracing::info!(chunk_count, "ingestion complete");
                IngestOutcome::Ingested {
                    chunk_count,
                    document_record_id,
                }
            }
            Err(error) => {
                tracing::error!(kind = error.kind(), error = %error, "ingestion failed");
                if let Err(e) = self.status.mark_error(doc.as_ref(), &error.to_string()).await {
                    tracing::error!(error = %e, "error status could not be recorded");
                }
                IngestOutcome::Failed {
                    error,
                    document_record_id,
                }
            }
        }
    }

    /// Steps that run after the filter. Any `Err` becomes an `error` status.
    async fn ingest(
        &self,
        event: &UploadEvent,
        doc: Option<&DocumentRef>,
    ) -> Result<usize, IngestError> {
        self.status.mark_processing(doc).await?;

        let bytes = self
            .objects
            .fetch(&event.bucket, &event.name)
            .await
            .map_err(|e| IngestError::Fetch(format!("{:#}", e)))?;

        let kind = ContentKind::from_path(&event.name)
            .ok_or_else(|| ExtractionError::UnsupportedKind(event.filename().to_string()))?;
        if let Some(declared) = event.content_type.as_deref() {
            if ContentKind::from_mime(declared).is_some_and(|k| k != kind) {
                tracing::warn!(
                    declared,
                    expected = kind.mime(),
                    "declared content type disagrees with extension; using extension"
                );
            }
        }
        // Parsers can panic on malformed input; keep that inside the exit path.
        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes, kind))
            .await
            .map_err(|e| ExtractionError::Panicked(e.to_string()))??;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyContent);
        }

        let chunks = self.policy().split(&text);
        tracing::info!(chunks = chunks.len(), chars = text.chars().count(), "text chunked");

        let intake = &self.config.intake;
        let ctx = ChunkContext::for_object(
            &intake.source_scheme,
            &event.bucket,
            &event.name,
            &intake.chunk_type,
            doc.map(|d| d.id.clone()),
        );
        let entries = self.knowledge.write_batch(&chunks, &ctx).await?;
        Ok(entries.len())
    }

    /// Handle events one after another, in order. `on_outcome` sees each
    /// event with its outcome before the next one starts.
    pub async fn process_events<I, F>(&self, events: I, mut on_outcome: F) -> RunSummary
    where
        I: IntoIterator<Item = UploadEvent>,
        F: FnMut(&UploadEvent, &IngestOutcome),
    {
        let mut summary = RunSummary::default();
        for event in events {
            let outcome = self.handle(&event).await;
            on_outcome(&event, &outcome);
            summary.record(&outcome);
        }
        summary
    }
}
