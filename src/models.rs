//! Core data models used throughout corpus-sync.
//!
//! These types represent the file metadata, canonical documents, and chunk
//! records that flow through the reconciliation and processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata describing one file in the source store (or, in stored form,
/// one previously indexed file in the destination).
///
/// Identity is `path`. Equality of `change_token` between the source and
/// indexed copies means the file does not need reprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Stable path of the file within the source store.
    pub path: String,
    pub file_name: String,
    /// Opaque token from the source store; changes whenever content changes.
    pub change_token: String,
    pub file_type: FileType,
    pub last_modified: DateTime<Utc>,
}

/// File formats the pipeline knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Text,
    Markdown,
    Spreadsheet,
    WordProcessor,
    Pdf,
}

impl FileType {
    /// Map a file extension (no leading dot) to a file type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(FileType::Text),
            "md" => Some(FileType::Markdown),
            "xlsx" => Some(FileType::Spreadsheet),
            "docx" => Some(FileType::WordProcessor),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Text => "text",
            FileType::Markdown => "markdown",
            FileType::Spreadsheet => "spreadsheet",
            FileType::WordProcessor => "word-processor",
            FileType::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sheet of a spreadsheet rendered as a markdown table.
#[derive(Debug, Clone)]
pub struct SheetTable {
    pub sheet_name: String,
    /// The sheet rendered as a markdown pipe table (with heading).
    pub markdown: String,
}

/// Canonical text produced by a parser, independent of source format.
///
/// Ephemeral: created per file, consumed by the chunker, never persisted.
#[derive(Debug, Clone, Default)]
pub struct CanonicalDocument {
    /// Markdown-flavored text of the whole document.
    pub text: String,
    /// Byte offset at which each page starts, in document order.
    /// Empty when the source format carries no page structure.
    pub page_offsets: Vec<(usize, u32)>,
    /// Per-sheet tables. Non-empty only for spreadsheet files, which take
    /// the table path through the processor instead of the chunker.
    pub tables: Vec<SheetTable>,
    /// Embedded artifacts (images) the parser could not interpret.
    pub unprocessed_artifacts: usize,
}

impl CanonicalDocument {
    /// Return the 1-based page number containing the given byte offset,
    /// or `None` when the document has no page structure.
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        if self.page_offsets.is_empty() {
            return None;
        }
        let mut page = self.page_offsets[0].1;
        for &(start, number) in &self.page_offsets {
            if start > offset {
                break;
            }
            page = number;
        }
        Some(page)
    }
}

/// One level of the header trail: a header value and the ordinal occurrence
/// of that value within the document (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRef {
    pub name: String,
    pub index: u32,
}

/// The unit of storage in the destination index.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    /// Record UUID, unique per upsert.
    pub id: String,
    pub chunk_text: String,
    /// 0-based, contiguous within one `(source_path, change_token)`.
    pub chunk_index: i64,
    pub source_path: String,
    pub file_name: String,
    pub file_type: FileType,
    pub document_title: String,
    pub change_token: String,
    pub keywords: Vec<String>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Up to three levels of enclosing headers, outermost first.
    pub header_trail: Vec<HeaderRef>,
    pub page_number: Option<u32>,
    /// Present only on the summary-bearing record of a spreadsheet sheet.
    pub table_summary: Option<String>,
}

/// The mutation plan derived from comparing two metadata snapshots.
///
/// Derived, not persisted; consumed once by the pipeline driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    /// Files that are new or updated and must be (re)processed.
    pub to_process: Vec<FileMetadata>,
    /// Paths whose stale index entries must be deleted.
    pub to_delete: Vec<String>,
    /// Paths present in both snapshots with equal tokens (skipped).
    pub unchanged: Vec<String>,
    /// Paths in `to_process` that were already indexed under an older token.
    pub updated: Vec<String>,
}

/// Pipeline stage at which a file failed. Augmentation has no variant:
/// it is best-effort and cannot fail a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Download,
    Parse,
    Chunk,
    Embed,
    Upsert,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Download => "download",
            Stage::Parse => "parse",
            Stage::Chunk => "chunk",
            Stage::Embed => "embed",
            Stage::Upsert => "upsert",
        };
        f.write_str(s)
    }
}

/// Outcome of processing a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub file_name: String,
    pub chunks: usize,
    pub unprocessed_artifacts: usize,
    /// Stage and error description when processing failed.
    pub failure: Option<FileFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub stage: Stage,
    pub kind: String,
    pub message: String,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Summary of one full sync run, written to the reporting sink.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub new_files: u64,
    pub updated_files: u64,
    pub deleted_files: u64,
    pub failed_files: u64,
    /// Planned files never taken up because the run was cancelled.
    pub skipped_files: u64,
    pub unchanged_files: u64,
    pub total_chunks_written: u64,
    /// Chunk count per successfully processed file.
    pub chunks_per_file: BTreeMap<String, u64>,
    pub failures: Vec<FileOutcome>,
}
