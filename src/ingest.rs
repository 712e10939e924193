//! Command-level entry points used by the `ingest` binary.
//!
//! Wires the SQLite store, the local bucket directory and the default
//! extractor into an [`IngestionPipeline`], then runs single events,
//! JSON Lines replays, or read-only inspections against it.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::extract::DefaultExtractor;
use crate::migrate;
use crate::models::{DocumentRecord, UploadEvent};
use crate::object_store::LocalBucketStore;
use crate::pipeline::{IngestOutcome, IngestionPipeline, RunSummary};
use crate::store::sqlite::SqliteStore;
use crate::store::{KnowledgeStore, StatusStore};

/// Open the database (creating the schema if needed) and build a pipeline on it.
pub async fn open_pipeline(config: Arc<Config>) -> Result<(IngestionPipeline, Arc<SqliteStore>)> {
    let store = open_store(&config).await?;
    let objects = Arc::new(LocalBucketStore::new(config.objects.root.clone()));
    let pipeline = IngestionPipeline::new(
        config,
        objects,
        Arc::new(DefaultExtractor),
        store.clone(),
        store.clone(),
    );
    Ok((pipeline, store))
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

/// Create a `pending` status record for `storage_path`. Returns its id.
pub async fn register_resource(
    config: &Config,
    storage_path: &str,
    title: Option<String>,
) -> Result<String> {
    if storage_path.is_empty() {
        bail!("storage path must not be empty");
    }
    let store = open_store(config).await?;
    let mut record = DocumentRecord::pending(Uuid::new_v4().to_string(), storage_path);
    record.title = title;
    store.insert(&record).await?;
    store.pool().close().await;
    Ok(record.id)
}

/// Run the pipeline for one event and print its outcome.
pub async fn run_handle(config: Arc<Config>, event: UploadEvent) -> Result<()> {
    let (pipeline, store) = open_pipeline(config).await?;
    let outcome = pipeline.handle(&event).await;
    print_outcome(&event, &outcome);
    store.pool().close().await;
    Ok(())
}

/// Replay JSON Lines upload events from `input` (stdin when `None`).
///
/// Lines that do not parse as an event are reported and skipped.
pub async fn run_replay(config: Arc<Config>, input: Option<&Path>) -> Result<RunSummary> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(std::io::BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open events file: {}", path.display()))?,
        )),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let events = parse_events(reader)?;
    let (pipeline, store) = open_pipeline(config).await?;

    let summary = pipeline.process_events(events, print_outcome).await;
    store.pool().close().await;
    Ok(summary)
}

fn parse_events(reader: impl BufRead) -> Result<Vec<UploadEvent>> {
    let mut events = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<UploadEvent>(trimmed) {
            Ok(ev) => events.push(ev),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "ignoring malformed event"),
        }
    }
    Ok(events)
}

fn print_outcome(event: &UploadEvent, outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Skipped(reason) => println!("skipped {} ({:?})", event.name, reason),
        IngestOutcome::Ingested { chunk_count, .. } => {
            println!("ingested {} ({} chunks)", event.name, chunk_count)
        }
        IngestOutcome::Failed { error, .. } => println!("failed {}: {}", event.name, error),
    }
}

/// Print every status record matching `storage_path` as pretty JSON.
pub async fn show_status(config: &Config, storage_path: &str) -> Result<()> {
    let store = open_store(config).await?;
    let records = store.find_by_storage_path(storage_path).await?;
    store.pool().close().await;
    if records.is_empty() {
        bail!("no document record for '{}'", storage_path);
    }
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Print the knowledge entry count, and the entries of one record if given.
pub async fn show_knowledge(config: &Config, record_id: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;
    println!("entries: {}", store.count().await?);
    if let Some(id) = record_id {
        let entries = store.entries_for_record(id).await?;
        let listed: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| serde_json::json!({ "id": e.id, "entry": e }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
    }
    store.pool().close().await;
    Ok(())
}
