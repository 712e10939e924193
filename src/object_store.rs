//! Object byte retrieval by `(bucket, path)`.
//!
//! [`LocalBucketStore`] serves objects from a directory tree laid out as
//! `<root>/<bucket>/<path>`, which is how uploads land when the intake
//! bucket is mounted or synced locally. [`InMemoryObjects`] is used in tests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Download the full content of one object.
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;
}

pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `bucket`/`path`. Rejects any component that
    /// would escape the bucket directory.
    pub fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut out = self.root.clone();
        for part in [bucket, path] {
            let rel = Path::new(part);
            if part.is_empty()
                || rel
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                bail!("invalid object location: {}/{}", bucket, path);
            }
            out.push(rel);
        }
        Ok(out)
    }
}

#[async_trait]
impl ObjectSource for LocalBucketStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let file = self.object_path(bucket, path)?;
        tokio::fs::read(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))
    }
}

/// Objects held in memory, keyed by `(bucket, path)`.
#[derive(Default)]
pub struct InMemoryObjects {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, path: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| anyhow!("object map lock poisoned"))?;
        objects.insert((bucket.to_string(), path.to_string()), bytes.into());
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for InMemoryObjects {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("object map lock poisoned"))?;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no such object: {}/{}", bucket, path))
    }
}
