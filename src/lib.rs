//! # Resource Ingest
//!
//! Turns uploaded documents (PDF or plain text) into overlapping text
//! chunks in a knowledge store for retrieval-augmented generation, while
//! keeping a per-document status record up to date.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────────┐   ┌─────────────┐
//! │ Upload event │──▶│         Pipeline           │──▶│  Knowledge  │
//! │ bucket+path  │   │ filter→extract→chunk→write │   │    store    │
//! └──────────────┘   └─────────────┬──────────────┘   └─────────────┘
//!                                  │ pending→processing→ready|error
//!                                  ▼
//!                           ┌─────────────┐
//!                           │   Status    │
//!                           │   records   │
//!                           └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Events, status records, knowledge entries |
//! | [`error`] | Ingestion error kinds |
//! | [`extract`] | PDF / text extraction |
//! | [`chunk`] | Sliding-window chunker |
//! | [`object_store`] | Object byte retrieval |
//! | [`knowledge`] | Knowledge batch writer |
//! | [`status`] | Document status tracker |
//! | [`pipeline`] | Orchestration and intake filter |
//! | [`ingest`] | CLI command entry points |
//! | [`store`] | Store traits, SQLite and in-memory backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod knowledge;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod object_store;
pub mod pipeline;
pub mod status;
pub mod store;
