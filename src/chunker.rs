//! Chunking strategy abstraction and factory.
//!
//! A [`Chunker`] splits canonical markdown text into an ordered sequence of
//! [`ChunkPiece`]s. Strategies are a closed set selected by configuration:
//!
//! | Strategy | Module | Behavior |
//! |----------|--------|----------|
//! | `markdown` | [`crate::chunker_markdown`] | header-aware sections with header trail |
//! | `recursive` | [`crate::chunker_recursive`] | separator-driven splits with overlap |
//! | `character` | [`crate::chunker_character`] | fixed windows with overlap |
//!
//! All sizes and overlaps are measured in characters, not bytes, so every
//! split lands on a UTF-8 boundary.

use crate::config::{ChunkingStrategy, ProcessingConfig};
use crate::error::ProcessError;
use crate::models::HeaderRef;

/// One split piece of a document, before metadata attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub text: String,
    /// Enclosing headers, outermost first. Empty for structure-free
    /// strategies.
    pub header_trail: Vec<HeaderRef>,
    /// Byte offset of this piece's own content within the source text
    /// (the overlap prefix of a recursive/character chunk is not counted).
    pub offset: usize,
}

impl ChunkPiece {
    pub fn new(text: String, offset: usize) -> Self {
        Self {
            text,
            header_trail: Vec::new(),
            offset,
        }
    }
}

/// Splits canonical text into ordered, non-empty pieces.
///
/// Implementations never touch the network and are deterministic for a
/// given input and configuration.
pub trait Chunker: Send + Sync {
    fn split(&self, text: &str) -> Result<Vec<ChunkPiece>, ProcessError>;
}

/// Validate the numeric chunking parameters shared by all strategies.
pub fn validate_params(chunk_size: usize, chunk_overlap: usize) -> Result<(), ProcessError> {
    if chunk_size == 0 {
        return Err(ProcessError::InvalidConfig(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(ProcessError::InvalidConfig(format!(
            "chunk_overlap ({}) must be < chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}

/// Build the chunker selected by the processing configuration.
pub fn create_chunker(config: &ProcessingConfig) -> Result<Box<dyn Chunker>, ProcessError> {
    validate_params(config.chunk_size, config.chunk_overlap)?;

    Ok(match config.chunking {
        ChunkingStrategy::Character => Box::new(
            crate::chunker_character::CharacterChunker::new(
                config.chunk_size,
                config.chunk_overlap,
            )?,
        ),
        ChunkingStrategy::Recursive => Box::new(crate::chunker_recursive::RecursiveChunker::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        )?),
        ChunkingStrategy::Markdown => Box::new(crate::chunker_markdown::MarkdownChunker::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
            config.header_levels as u8,
        )?),
    })
}
