//! # corpus-sync
//!
//! Incremental synchronization of a document corpus into a vector-capable
//! chunk index.
//!
//! Each run lists the source store and the destination index, diffs the two
//! by change token, and processes only what changed: new and updated files
//! are downloaded, parsed to canonical markdown, chunked, optionally
//! augmented, embedded, and upserted; vanished files have their chunks
//! deleted. Unchanged files cost one metadata comparison.
//!
//! ```text
//! ┌────────────┐    ┌────────────────────────────────┐    ┌───────────┐
//! │   Source   │──▶│  plan → parse → chunk → augment │──▶│   Chunk   │
//! │  drive/fs  │    │       → embed → upsert          │    │   index   │
//! └────────────┘    └────────────────────────────────┘    └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`diff`] | Change detection between source and index snapshots |
//! | [`parser`] | Format dispatch to the per-format parsers |
//! | [`chunker`] | Chunking strategies |
//! | [`augment`] | Chunk augmentation agents |
//! | [`processor`] | Per-file orchestration |
//! | [`pipeline`] | Whole-run driver |
//! | [`report`] | SQLite run-report sink |

pub mod augment;
pub mod chunker;
pub mod chunker_character;
pub mod chunker_markdown;
pub mod chunker_recursive;
pub mod completion;
pub mod config;
pub mod diff;
pub mod embedding;
pub mod error;
pub mod http;
pub mod index_http;
pub mod index_memory;
pub mod keywords;
pub mod models;
pub mod ocr;
pub mod parser;
pub mod parser_docx;
pub mod parser_pdf;
pub mod parser_sheet;
pub mod parser_text;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod report;
pub mod source_drive;
pub mod source_fs;
pub mod sync_cmd;
pub mod traits;
