//! Capability traits at the pipeline's external seams.
//!
//! The core never talks to a network or a database directly; it goes through
//! these narrow traits. Production wiring uses the HTTP implementations in
//! [`crate::source_drive`], [`crate::index_http`], [`crate::completion`],
//! [`crate::ocr`], and [`crate::embedding`]; tests substitute in-memory
//! fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, FileMetadata, RunReport};

/// The remote file store the corpus is read from.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// List every file currently in the corpus with its change token.
    async fn list_files(&self) -> Result<Vec<FileMetadata>>;

    /// Download the raw bytes of one file.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}

/// The vector-capable destination store holding chunk records.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// One representative record per distinct indexed path, carrying that
    /// path's current change token.
    async fn list_indexed(&self) -> Result<Vec<FileMetadata>>;

    /// Write a batch of chunk records.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Delete every record stored under a path.
    async fn delete_by_path(&self, path: &str) -> Result<()>;

    /// Delete records under a path whose change token differs from
    /// `keep_token`. Used for the insert-then-delete update ordering.
    async fn delete_stale(&self, path: &str, keep_token: &str) -> Result<()>;
}

/// Structure extraction for complex layouts (PDF). Returns markdown with
/// page-boundary markers (see [`crate::ocr::PAGE_BREAK_MARKER`]).
#[async_trait]
pub trait StructureExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Turns an embedded image into a short textual description.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image_bytes: &[u8]) -> Result<String>;
}

/// Generative completion, used for summaries, rewrites, table descriptions,
/// and keyword extraction.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Maps text to a fixed-length embedding vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch, preserving input order. The default implementation
    /// loops over [`embed`](EmbeddingService::embed).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Receives the end-of-run summary.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_report(&self, report: &RunReport) -> Result<()>;
}
