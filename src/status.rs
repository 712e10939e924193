//! Document status tracking.
//!
//! Every mutation takes an `Option<&DocumentRef>`: when no record was
//! located for the upload, the call is a no-op returning `Ok(())`.

use std::sync::Arc;

use crate::error::IngestError;
use crate::models::{DocumentRef, StatusUpdate};
use crate::store::StatusStore;

pub struct StatusTracker {
    store: Arc<dyn StatusStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Find the record for `storage_path`, taking the first match.
    pub async fn locate(&self, storage_path: &str) -> Result<Option<DocumentRef>, IngestError> {
        let matches = self
            .store
            .find_by_storage_path(storage_path)
            .await
            .map_err(|e| IngestError::StatusUpdate(format!("lookup failed: {:#}", e)))?;

        if matches.len() > 1 {
            tracing::warn!(
                storage_path,
                matches = matches.len(),
                "multiple document records share this storage path; using the first"
            );
        }

        Ok(matches.into_iter().next().map(|r| DocumentRef { id: r.id }))
    }

    pub async fn mark_processing(&self, doc: Option<&DocumentRef>) -> Result<(), IngestError> {
        self.apply(doc, StatusUpdate::processing()).await
    }

    pub async fn mark_ready(
        &self,
        doc: Option<&DocumentRef>,
        chunk_count: usize,
    ) -> Result<(), IngestError> {
        self.apply(doc, StatusUpdate::ready(chunk_count as i64)).await
    }

    pub async fn mark_error(
        &self,
        doc: Option<&DocumentRef>,
        message: &str,
    ) -> Result<(), IngestError> {
        self.apply(doc, StatusUpdate::error(message)).await
    }

    async fn apply(&self, doc: Option<&DocumentRef>, update: StatusUpdate) -> Result<(), IngestError> {
        let Some(doc) = doc else {
            return Ok(());
        };
        self.store
            .apply_update(&doc.id, update)
            .await
            .map_err(|e| IngestError::StatusUpdate(format!("{:#}", e)))
    }
}
