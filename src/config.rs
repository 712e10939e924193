//! TOML configuration, loaded once at startup.
//!
//! The resulting [`Config`] is immutable and handed to each component
//! explicitly; nothing reads configuration from ambient global state.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{ChunkPolicy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub objects: ObjectsConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Root directory holding one subdirectory per bucket.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectsConfig {
    #[serde(default = "default_objects_root")]
    pub root: PathBuf,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            root: default_objects_root(),
        }
    }
}

fn default_objects_root() -> PathBuf {
    PathBuf::from("./buckets")
}

/// Which uploads are ingested, and how their chunks are tagged.
#[derive(Debug, Deserialize, Clone)]
pub struct IntakeConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_source_scheme")]
    pub source_scheme: String,
    #[serde(default = "default_chunk_type")]
    pub chunk_type: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            extensions: default_extensions(),
            source_scheme: default_source_scheme(),
            chunk_type: default_chunk_type(),
        }
    }
}

fn default_prefix() -> String {
    "resources/".to_string()
}
fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string()]
}
fn default_source_scheme() -> String {
    "gs".to_string()
}
fn default_chunk_type() -> String {
    "storage_upload".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            size: self.size,
            overlap: self.overlap,
        }
    }
}

fn default_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KnowledgeConfig {
    /// Largest batch the knowledge store accepts; `None` means unbounded.
    #[serde(default)]
    pub max_batch_entries: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration with every default applied and the database at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            objects: ObjectsConfig::default(),
            intake: IntakeConfig::default(),
            chunking: ChunkingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            anyhow::bail!("chunking.size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.size {
            anyhow::bail!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap,
                self.chunking.size
            );
        }
        if self.intake.prefix.is_empty() {
            anyhow::bail!("intake.prefix must not be empty");
        }
        if self.intake.extensions.is_empty() {
            anyhow::bail!("intake.extensions must list at least one extension");
        }
        if self.intake.source_scheme.is_empty() {
            anyhow::bail!("intake.source_scheme must not be empty");
        }
        if self.knowledge.max_batch_entries == Some(0) {
            anyhow::bail!("knowledge.max_batch_entries must be > 0 when set");
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
