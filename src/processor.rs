//! Per-file processing orchestrator.
//!
//! Drives one file through download, parse, chunk, augment, embed, and
//! upsert. Every failure is caught at this boundary and turned into a
//! [`FileOutcome`] carrying the stage and error kind, so one bad file
//! never halts the run.
//!
//! Update consistency: new records are written first, then the path's
//! records under older change tokens are deleted. A crash between the two
//! steps leaves a superset in the index (briefly duplicated, never
//! missing), and the next run converges it.

use std::sync::Arc;

use uuid::Uuid;

use crate::augment::{create_augmenter, Augmenter};
use crate::chunker::{create_chunker, Chunker};
use crate::config::ProcessingConfig;
use crate::error::ProcessError;
use crate::keywords::KeywordGenerator;
use crate::models::{
    CanonicalDocument, ChunkRecord, FileFailure, FileMetadata, FileOutcome, FileType, Stage,
};
use crate::parser::DocumentParser;
use crate::traits::{
    CompletionService, EmbeddingService, ImageDescriber, IndexStore, SourceStore,
    StructureExtractor,
};

const TABLE_SUMMARY_SYSTEM: &str = "Describe what this table contains in two or three \
    sentences: its subject, its columns, and anything notable in the data. \
    Return only the description.";

pub struct FileProcessor {
    parser: DocumentParser,
    chunker: Box<dyn Chunker>,
    augmenter: Box<dyn Augmenter>,
    keywords: Option<KeywordGenerator>,
    source: Arc<dyn SourceStore>,
    index: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingService>,
    completion: Option<Arc<dyn CompletionService>>,
}

impl FileProcessor {
    pub fn new(
        config: &ProcessingConfig,
        source: Arc<dyn SourceStore>,
        index: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingService>,
        completion: Option<Arc<dyn CompletionService>>,
        extractor: Option<Arc<dyn StructureExtractor>>,
        describer: Option<Arc<dyn ImageDescriber>>,
    ) -> Result<Self, ProcessError> {
        let keywords = if config.keywords {
            completion.clone().map(KeywordGenerator::new)
        } else {
            None
        };
        Ok(Self {
            parser: DocumentParser::new(config, extractor, describer),
            chunker: create_chunker(config)?,
            augmenter: create_augmenter(config.augmentation, completion.clone())?,
            keywords,
            source,
            index,
            embedder,
            completion,
        })
    }

    /// Process one file end to end. `previously_indexed` marks updated
    /// files, whose stale records are deleted after the new ones land.
    pub async fn process(&self, meta: &FileMetadata, previously_indexed: bool) -> FileOutcome {
        match self.run(meta, previously_indexed).await {
            Ok((chunks, unprocessed)) => FileOutcome {
                path: meta.path.clone(),
                file_name: meta.file_name.clone(),
                chunks,
                unprocessed_artifacts: unprocessed,
                failure: None,
            },
            Err((stage, kind, message)) => FileOutcome {
                path: meta.path.clone(),
                file_name: meta.file_name.clone(),
                chunks: 0,
                unprocessed_artifacts: 0,
                failure: Some(FileFailure {
                    stage,
                    kind,
                    message,
                }),
            },
        }
    }

    async fn run(
        &self,
        meta: &FileMetadata,
        previously_indexed: bool,
    ) -> Result<(usize, usize), (Stage, String, String)> {
        let bytes = self
            .source
            .download(&meta.path)
            .await
            .map_err(|e| (Stage::Download, "external-service".to_string(), e.to_string()))?;

        let doc = match self.parser.parse(meta.file_type, &bytes).await {
            Ok(doc) => doc,
            // Zero-chunk success; stale entries are still cleaned up below.
            Err(ProcessError::EmptyDocument) => CanonicalDocument::default(),
            Err(e) => return Err((Stage::Parse, e.kind().to_string(), e.to_string())),
        };

        let records = if meta.file_type == FileType::Spreadsheet {
            self.table_records(meta, &doc).await?
        } else {
            self.text_records(meta, &doc).await?
        };

        let written = records.len();
        if written > 0 {
            self.index
                .upsert(&records)
                .await
                .map_err(|e| (Stage::Upsert, "external-service".to_string(), e.to_string()))?;
        }
        if previously_indexed {
            self.index
                .delete_stale(&meta.path, &meta.change_token)
                .await
                .map_err(|e| (Stage::Upsert, "external-service".to_string(), e.to_string()))?;
        }

        Ok((written, doc.unprocessed_artifacts))
    }

    /// Chunk, augment, and embed a linear document.
    async fn text_records(
        &self,
        meta: &FileMetadata,
        doc: &CanonicalDocument,
    ) -> Result<Vec<ChunkRecord>, (Stage, String, String)> {
        if doc.text.trim().is_empty() {
            // Zero-chunk success: the file is counted as processed.
            return Ok(Vec::new());
        }

        let pieces = self
            .chunker
            .split(&doc.text)
            .map_err(|e| (Stage::Chunk, e.kind().to_string(), e.to_string()))?;
        if pieces.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();
        let augmented = self.augmenter.augment(texts, &doc.text).await;

        let embeddings = self
            .embedder
            .embed_batch(&augmented)
            .await
            .map_err(|e| (Stage::Embed, "external-service".to_string(), e.to_string()))?;
        if embeddings.len() != augmented.len() {
            return Err((
                Stage::Embed,
                "external-service".to_string(),
                format!(
                    "{} embeddings for {} chunks",
                    embeddings.len(),
                    augmented.len()
                ),
            ));
        }

        let mut records = Vec::with_capacity(pieces.len());
        for (i, ((piece, text), embedding)) in pieces
            .iter()
            .zip(augmented)
            .zip(embeddings)
            .enumerate()
        {
            let keywords = self.chunk_keywords(&text).await;
            records.push(ChunkRecord {
                id: Uuid::new_v4().to_string(),
                chunk_text: text,
                chunk_index: i as i64,
                source_path: meta.path.clone(),
                file_name: meta.file_name.clone(),
                file_type: meta.file_type,
                document_title: document_title(&meta.file_name),
                change_token: meta.change_token.clone(),
                keywords,
                embedding,
                header_trail: piece.header_trail.clone(),
                page_number: doc.page_at(piece.offset),
                table_summary: None,
            });
        }
        Ok(records)
    }

    /// Spreadsheets bypass the chunker: each sheet yields a summary-bearing
    /// record embedded from its description and a second record embedded
    /// from the table plus description. Without a usable description the
    /// sheet degrades to a single record embedded from the table itself.
    async fn table_records(
        &self,
        meta: &FileMetadata,
        doc: &CanonicalDocument,
    ) -> Result<Vec<ChunkRecord>, (Stage, String, String)> {
        let mut inputs: Vec<String> = Vec::new();
        let mut drafts: Vec<(String, Option<String>)> = Vec::new();

        for sheet in &doc.tables {
            let summary = match &self.completion {
                Some(completion) => completion
                    .complete(TABLE_SUMMARY_SYSTEM, &sheet.markdown)
                    .await
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                None => None,
            };

            match summary {
                Some(summary) => {
                    inputs.push(summary.clone());
                    drafts.push((sheet.markdown.clone(), Some(summary.clone())));

                    inputs.push(format!("{}\n\n{}", sheet.markdown, summary));
                    drafts.push((format!("{}\n\n{}", sheet.markdown, summary), None));
                }
                None => {
                    inputs.push(sheet.markdown.clone());
                    drafts.push((sheet.markdown.clone(), None));
                }
            }
        }

        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .embedder
            .embed_batch(&inputs)
            .await
            .map_err(|e| (Stage::Embed, "external-service".to_string(), e.to_string()))?;
        if embeddings.len() != drafts.len() {
            return Err((
                Stage::Embed,
                "external-service".to_string(),
                format!("{} embeddings for {} records", embeddings.len(), drafts.len()),
            ));
        }

        let mut records = Vec::with_capacity(drafts.len());
        for (i, ((chunk_text, table_summary), embedding)) in
            drafts.into_iter().zip(embeddings).enumerate()
        {
            let keyword_source = table_summary.as_deref().unwrap_or(&chunk_text).to_string();
            let keywords = self.chunk_keywords(&keyword_source).await;
            records.push(ChunkRecord {
                id: Uuid::new_v4().to_string(),
                chunk_text,
                chunk_index: i as i64,
                source_path: meta.path.clone(),
                file_name: meta.file_name.clone(),
                file_type: meta.file_type,
                document_title: document_title(&meta.file_name),
                change_token: meta.change_token.clone(),
                keywords,
                embedding,
                header_trail: Vec::new(),
                page_number: None,
                table_summary,
            });
        }
        Ok(records)
    }

    async fn chunk_keywords(&self, text: &str) -> Vec<String> {
        match &self.keywords {
            Some(generator) => generator.keywords(text).await,
            None => Vec::new(),
        }
    }
}

/// File name without its extension.
fn document_title(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}
