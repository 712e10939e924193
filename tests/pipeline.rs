//! End-to-end pipeline behaviour against in-memory stores.
//!
//! Covers the intake filter, the status state machine on success and on
//! each failure path, and the shape of the written knowledge entries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use resource_ingest::config::Config;
use resource_ingest::error::{ExtractionError, IngestError};
use resource_ingest::extract::{ContentKind, DefaultExtractor, TextExtractor};
use resource_ingest::models::{
    DocumentRecord, KnowledgeEntry, RagStatus, StatusUpdate, UploadEvent,
};
use resource_ingest::object_store::{InMemoryObjects, ObjectSource};
use resource_ingest::pipeline::{IngestOutcome, IngestionPipeline, SkipReason};
use resource_ingest::store::memory::InMemoryStore;
use resource_ingest::store::{KnowledgeStore, StatusStore};

const BUCKET: &str = "school-materials";

/// Minimal valid PDF with one page per entry in `pages`.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, "<< /Font << /F1 3 0 R >> >>")
}

fn build_pdf(pages: &[&str], resources: &str) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<String> = Vec::new();
    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids, page_count
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources {} >>",
            content_id, resources
        ));
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

struct Harness {
    pipeline: IngestionPipeline,
    store: Arc<InMemoryStore>,
    objects: Arc<InMemoryObjects>,
}

fn test_config() -> Arc<Config> {
    Arc::new(Config::with_db_path("unused.sqlite"))
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let objects = Arc::new(InMemoryObjects::new());
    let pipeline = IngestionPipeline::new(
        test_config(),
        objects.clone(),
        Arc::new(DefaultExtractor),
        store.clone(),
        store.clone(),
    );
    Harness {
        pipeline,
        store,
        objects,
    }
}

impl Harness {
    async fn register(&self, id: &str, path: &str) {
        self.store
            .insert(&DocumentRecord::pending(id, path))
            .await
            .unwrap();
    }

    fn upload(&self, path: &str, bytes: impl Into<Vec<u8>>) -> UploadEvent {
        self.objects.put(BUCKET, path, bytes).unwrap();
        UploadEvent::new(BUCKET, path)
    }

    async fn record(&self, id: &str) -> DocumentRecord {
        self.store.get(id).await.unwrap().unwrap()
    }

    fn knowledge(&self) -> Vec<KnowledgeEntry> {
        self.store.knowledge_snapshot().unwrap()
    }
}

// ─── Happy path ──────────────────────────────────────────────────────────

#[tokio::test]
async fn text_upload_is_chunked_and_marked_ready() {
    let h = harness();
    h.register("rec-1", "resources/math/notes.txt").await;
    let text: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let event = h.upload("resources/math/notes.txt", text.clone());

    let outcome = h.pipeline.handle(&event).await;
    match outcome {
        IngestOutcome::Ingested {
            chunk_count,
            document_record_id,
        } => {
            assert_eq!(chunk_count, 3);
            assert_eq!(document_record_id.as_deref(), Some("rec-1"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let rec = h.record("rec-1").await;
    assert_eq!(rec.rag_status, RagStatus::Ready);
    assert_eq!(rec.chunk_count, Some(3));
    assert!(rec.processed_at.is_some());
    assert!(rec.rag_error.is_none());

    let entries = h.knowledge();
    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec![&text[0..800], &text[700..1500], &text[1400..2000]]);

    for e in &entries {
        assert_eq!(
            e.metadata.source,
            "gs://school-materials/resources/math/notes.txt"
        );
        assert_eq!(e.metadata.filename, "notes.txt");
        assert_eq!(e.metadata.kind, "storage_upload");
        assert_eq!(e.metadata.document_record_id.as_deref(), Some("rec-1"));
        assert!(e.metadata.timestamp.ends_with('Z'));
    }
    let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn pdf_pages_are_extracted_in_order() {
    let h = harness();
    h.register("rec-pdf", "resources/lesson.pdf").await;
    let event = h.upload(
        "resources/lesson.pdf",
        pdf_with_pages(&["alpha page text", "omega page text"]),
    );

    let outcome = h.pipeline.handle(&event).await;
    assert!(
        matches!(outcome, IngestOutcome::Ingested { chunk_count: 1, .. }),
        "{:?}",
        outcome
    );

    let entries = h.knowledge();
    let text = &entries[0].text;
    let alpha = text.find("alpha page text").expect("first page text");
    let omega = text.find("omega page text").expect("second page text");
    assert!(alpha < omega);
    assert_eq!(h.record("rec-pdf").await.rag_status, RagStatus::Ready);
}

#[tokio::test]
async fn uppercase_extension_is_accepted() {
    let h = harness();
    let event = h.upload("resources/NOTES.TXT", "upper case extension");
    assert!(matches!(
        h.pipeline.handle(&event).await,
        IngestOutcome::Ingested { chunk_count: 1, .. }
    ));
}

// ─── Intake filter ───────────────────────────────────────────────────────

/// Status + knowledge store that counts every call.
#[derive(Default)]
struct CountingStore {
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    fn bump(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KnowledgeStore for CountingStore {
    async fn write_batch(&self, _entries: &[KnowledgeEntry]) -> Result<()> {
        self.bump();
        Ok(())
    }
    async fn count(&self) -> Result<usize> {
        self.bump();
        Ok(0)
    }
    async fn entries_for_record(&self, _record_id: &str) -> Result<Vec<KnowledgeEntry>> {
        self.bump();
        Ok(Vec::new())
    }
    async fn entries_by_source(&self, _source: &str) -> Result<Vec<KnowledgeEntry>> {
        self.bump();
        Ok(Vec::new())
    }
}

#[async_trait]
impl StatusStore for CountingStore {
    async fn find_by_storage_path(&self, _storage_path: &str) -> Result<Vec<DocumentRecord>> {
        self.bump();
        Ok(Vec::new())
    }
    async fn get(&self, _id: &str) -> Result<Option<DocumentRecord>> {
        self.bump();
        Ok(None)
    }
    async fn insert(&self, _record: &DocumentRecord) -> Result<()> {
        self.bump();
        Ok(())
    }
    async fn apply_update(&self, _id: &str, _update: StatusUpdate) -> Result<()> {
        self.bump();
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for CountingStore {
    async fn fetch(&self, _bucket: &str, _path: &str) -> Result<Vec<u8>> {
        self.bump();
        Ok(b"content".to_vec())
    }
}

#[tokio::test]
async fn filtered_events_touch_no_store() {
    let counter = Arc::new(CountingStore::default());
    let pipeline = IngestionPipeline::new(
        test_config(),
        counter.clone(),
        Arc::new(DefaultExtractor),
        counter.clone(),
        counter.clone(),
    );

    let cases = [
        ("uploads/a.pdf", SkipReason::OutsideIntake),
        ("Resources/a.pdf", SkipReason::OutsideIntake),
        ("avatars/resources/a.txt", SkipReason::OutsideIntake),
        ("resources/a.png", SkipReason::UnsupportedExtension),
        ("resources/a.docx", SkipReason::UnsupportedExtension),
        ("resources/a.txt.bak", SkipReason::UnsupportedExtension),
    ];
    for (path, reason) in cases {
        let outcome = pipeline.handle(&UploadEvent::new(BUCKET, path)).await;
        match outcome {
            IngestOutcome::Skipped(r) => assert_eq!(r, reason, "{}", path),
            other => panic!("{} should be skipped, got {:?}", path, other),
        }
    }
    assert_eq!(counter.calls(), 0);

    // Sanity check: an accepted path does reach the stores.
    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/a.txt"))
        .await;
    assert!(!outcome.is_skipped());
    assert!(counter.calls() > 0);
}

// ─── Failure paths ───────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_pdf_marks_error_and_writes_nothing() {
    let h = harness();
    h.register("rec-bad", "resources/broken.pdf").await;
    let event = h.upload("resources/broken.pdf", "this is not a pdf at all");

    let outcome = h.pipeline.handle(&event).await;
    match outcome {
        IngestOutcome::Failed { error, .. } => {
            assert!(matches!(error, IngestError::Extraction(_)), "{:?}", error)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let rec = h.record("rec-bad").await;
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert!(!rec.rag_error.unwrap_or_default().is_empty());
    assert!(rec.chunk_count.is_none());
    assert!(rec.processed_at.is_none());
    assert!(h.knowledge().is_empty());
}

#[tokio::test]
async fn whitespace_text_marks_empty_error() {
    let h = harness();
    h.register("rec-empty", "resources/blank.txt").await;
    let event = h.upload("resources/blank.txt", "  \n\t \r\n  ");

    let outcome = h.pipeline.handle(&event).await;
    assert!(matches!(
        outcome,
        IngestOutcome::Failed {
            error: IngestError::EmptyContent,
            ..
        }
    ));

    let rec = h.record("rec-empty").await;
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert_eq!(rec.rag_error.as_deref(), Some("Extracted text is empty"));
    assert!(h.knowledge().is_empty());
}

#[tokio::test]
async fn missing_object_marks_error() {
    let h = harness();
    h.register("rec-gone", "resources/gone.txt").await;
    let outcome = h
        .pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/gone.txt"))
        .await;
    assert!(matches!(
        outcome,
        IngestOutcome::Failed {
            error: IngestError::Fetch(_),
            ..
        }
    ));
    let rec = h.record("rec-gone").await;
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert!(rec.rag_error.unwrap().contains("gone.txt"));
}

#[tokio::test]
async fn error_is_cleared_by_successful_reprocessing() {
    let h = harness();
    h.register("rec-retry", "resources/retry.txt").await;
    let event = h.upload("resources/retry.txt", "   ");
    h.pipeline.handle(&event).await;
    assert_eq!(h.record("rec-retry").await.rag_status, RagStatus::Error);

    let event = h.upload("resources/retry.txt", "now with real content");
    h.pipeline.handle(&event).await;
    let rec = h.record("rec-retry").await;
    assert_eq!(rec.rag_status, RagStatus::Ready);
    assert!(rec.rag_error.is_none());
    assert_eq!(rec.chunk_count, Some(1));
}

/// Extractor that panics on every document.
struct PanickingExtractor;

impl TextExtractor for PanickingExtractor {
    fn extract(&self, _bytes: &[u8], _kind: ContentKind) -> Result<String, ExtractionError> {
        panic!("font F9 not found in page resources");
    }
}

#[tokio::test]
async fn extractor_panic_marks_error_and_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(&DocumentRecord::pending("rec-p", "resources/p.pdf"))
        .await
        .unwrap();
    let objects = Arc::new(InMemoryObjects::new());
    objects
        .put(BUCKET, "resources/p.pdf", pdf_with_pages(&["page"]))
        .unwrap();
    let pipeline = IngestionPipeline::new(
        test_config(),
        objects,
        Arc::new(PanickingExtractor),
        store.clone(),
        store.clone(),
    );

    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/p.pdf"))
        .await;
    match outcome {
        IngestOutcome::Failed { error, .. } => assert!(
            matches!(error, IngestError::Extraction(ExtractionError::Panicked(_))),
            "{:?}",
            error
        ),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let rec = store.get("rec-p").await.unwrap().unwrap();
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert!(!rec.rag_error.unwrap_or_default().is_empty());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn pdf_with_undeclared_font_marks_error() {
    let h = harness();
    h.register("rec-font", "resources/nofont.pdf").await;
    let event = h.upload("resources/nofont.pdf", build_pdf(&["lost text"], "<< >>"));

    let outcome = h.pipeline.handle(&event).await;
    assert!(matches!(outcome, IngestOutcome::Failed { .. }), "{:?}", outcome);

    let rec = h.record("rec-font").await;
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert!(!rec.rag_error.unwrap_or_default().is_empty());
    assert!(h.knowledge().is_empty());
}

/// Knowledge store that rejects every batch.
struct RejectingKnowledge;

#[async_trait]
impl KnowledgeStore for RejectingKnowledge {
    async fn write_batch(&self, _entries: &[KnowledgeEntry]) -> Result<()> {
        Err(anyhow!("payload too large"))
    }
    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
    async fn entries_for_record(&self, _record_id: &str) -> Result<Vec<KnowledgeEntry>> {
        Ok(Vec::new())
    }
    async fn entries_by_source(&self, _source: &str) -> Result<Vec<KnowledgeEntry>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn rejected_batch_marks_error() {
    let status = Arc::new(InMemoryStore::new());
    status
        .insert(&DocumentRecord::pending("rec-w", "resources/w.txt"))
        .await
        .unwrap();
    let objects = Arc::new(InMemoryObjects::new());
    objects.put(BUCKET, "resources/w.txt", "hello").unwrap();
    let pipeline = IngestionPipeline::new(
        test_config(),
        objects,
        Arc::new(DefaultExtractor),
        Arc::new(RejectingKnowledge),
        status.clone(),
    );

    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/w.txt"))
        .await;
    assert!(matches!(
        outcome,
        IngestOutcome::Failed {
            error: IngestError::Write(_),
            ..
        }
    ));
    let rec = status.get("rec-w").await.unwrap().unwrap();
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert!(rec.rag_error.unwrap().contains("payload too large"));
}

/// Status store that fails any update moving a record into `fail_on`.
struct FlakyStatus {
    inner: InMemoryStore,
    fail_on: RagStatus,
    fail_lookup: bool,
}

#[async_trait]
impl StatusStore for FlakyStatus {
    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Vec<DocumentRecord>> {
        if self.fail_lookup {
            return Err(anyhow!("status store unavailable"));
        }
        self.inner.find_by_storage_path(storage_path).await
    }
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.inner.get(id).await
    }
    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        self.inner.insert(record).await
    }
    async fn apply_update(&self, id: &str, update: StatusUpdate) -> Result<()> {
        if update.rag_status == Some(self.fail_on) {
            return Err(anyhow!("deadline exceeded"));
        }
        self.inner.apply_update(id, update).await
    }
}

async fn flaky_pipeline(
    fail_on: RagStatus,
    fail_lookup: bool,
    body: &str,
) -> (IngestionPipeline, Arc<FlakyStatus>, Arc<InMemoryStore>) {
    let status = Arc::new(FlakyStatus {
        inner: InMemoryStore::new(),
        fail_on,
        fail_lookup,
    });
    status
        .insert(&DocumentRecord::pending("rec-f", "resources/f.txt"))
        .await
        .unwrap();
    let knowledge = Arc::new(InMemoryStore::new());
    let objects = Arc::new(InMemoryObjects::new());
    objects.put(BUCKET, "resources/f.txt", body).unwrap();
    let pipeline = IngestionPipeline::new(
        test_config(),
        objects,
        Arc::new(DefaultExtractor),
        knowledge.clone(),
        status.clone(),
    );
    (pipeline, status, knowledge)
}

#[tokio::test]
async fn failed_error_mark_is_swallowed() {
    let (pipeline, status, knowledge) = flaky_pipeline(RagStatus::Error, false, "   ").await;
    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/f.txt"))
        .await;
    assert!(matches!(
        outcome,
        IngestOutcome::Failed {
            error: IngestError::EmptyContent,
            ..
        }
    ));
    // The error mark could not land; the record is left in processing.
    let rec = status.get("rec-f").await.unwrap().unwrap();
    assert_eq!(rec.rag_status, RagStatus::Processing);
    assert_eq!(knowledge.count().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_ready_mark_keeps_written_chunks() {
    let (pipeline, status, knowledge) =
        flaky_pipeline(RagStatus::Ready, false, "real content").await;
    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/f.txt"))
        .await;
    assert!(matches!(
        outcome,
        IngestOutcome::Ingested { chunk_count: 1, .. }
    ));
    let rec = status.get("rec-f").await.unwrap().unwrap();
    assert_eq!(rec.rag_status, RagStatus::Processing);
    assert_eq!(knowledge.count().await.unwrap(), 1);
}

#[tokio::test]
async fn failed_processing_mark_aborts_before_writing() {
    let (pipeline, status, knowledge) =
        flaky_pipeline(RagStatus::Processing, false, "real content").await;
    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/f.txt"))
        .await;
    assert!(matches!(
        outcome,
        IngestOutcome::Failed {
            error: IngestError::StatusUpdate(_),
            ..
        }
    ));
    let rec = status.get("rec-f").await.unwrap().unwrap();
    assert_eq!(rec.rag_status, RagStatus::Error);
    assert_eq!(knowledge.count().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_lookup_still_ingests_untracked() {
    let (pipeline, status, knowledge) =
        flaky_pipeline(RagStatus::Error, true, "real content").await;
    let outcome = pipeline
        .handle(&UploadEvent::new(BUCKET, "resources/f.txt"))
        .await;
    match outcome {
        IngestOutcome::Ingested {
            document_record_id, ..
        } => assert!(document_record_id.is_none()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        status.get("rec-f").await.unwrap().unwrap().rag_status,
        RagStatus::Pending
    );
    assert_eq!(knowledge.count().await.unwrap(), 1);
}

// ─── Record tolerance and repeat delivery ────────────────────────────────

#[tokio::test]
async fn missing_record_still_ingests_with_null_reference() {
    let h = harness();
    let event = h.upload("resources/orphan.txt", "knowledge without a record");

    let outcome = h.pipeline.handle(&event).await;
    assert!(matches!(
        outcome,
        IngestOutcome::Ingested {
            chunk_count: 1,
            document_record_id: None
        }
    ));
    let entries = h.knowledge();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].metadata.document_record_id.is_none());
    let json = serde_json::to_value(&entries[0]).unwrap();
    assert!(json["metadata"]["documentRecordId"].is_null());
}

#[tokio::test]
async fn duplicate_records_use_the_first() {
    let h = harness();
    h.register("first", "resources/dup.txt").await;
    h.register("second", "resources/dup.txt").await;
    let event = h.upload("resources/dup.txt", "shared path");

    h.pipeline.handle(&event).await;
    assert_eq!(h.record("first").await.rag_status, RagStatus::Ready);
    assert_eq!(h.record("second").await.rag_status, RagStatus::Pending);
    assert_eq!(
        h.knowledge()[0].metadata.document_record_id.as_deref(),
        Some("first")
    );
}

#[tokio::test]
async fn repeated_event_ingests_twice_with_fresh_ids() {
    let h = harness();
    h.register("rec-rep", "resources/repeat.txt").await;
    let event = h.upload("resources/repeat.txt", "x".repeat(1000));

    let summary = h
        .pipeline
        .process_events(vec![event.clone(), event], |_, _| {})
        .await;
    assert_eq!(summary.ingested, 2);
    assert_eq!(summary.chunks_written, 4);

    let entries = h.knowledge();
    assert_eq!(entries.len(), 4);
    let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(entries[0].text, entries[2].text);

    let rec = h.record("rec-rep").await;
    assert_eq!(rec.rag_status, RagStatus::Ready);
    assert_eq!(rec.chunk_count, Some(2));
}

#[tokio::test]
async fn process_events_counts_every_outcome() {
    let h = harness();
    let good = h.upload("resources/good.txt", "fine");
    let empty = h.upload("resources/empty.txt", "");
    let skipped = UploadEvent::new(BUCKET, "thumbnails/cover.png");

    let mut seen = Vec::new();
    let summary = h
        .pipeline
        .process_events(vec![good, empty, skipped], |event, outcome| {
            seen.push((event.name.clone(), outcome.is_skipped()))
        })
        .await;
    assert_eq!(
        seen,
        vec![
            ("resources/good.txt".to_string(), false),
            ("resources/empty.txt".to_string(), false),
            ("thumbnails/cover.png".to_string(), true),
        ]
    );
    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.chunks_written, 1);
}
