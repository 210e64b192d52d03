//! Header-aware markdown chunker.
//!
//! Scans the document line by line and closes the current section whenever
//! an ATX header at or below the configured depth appears. Each section
//! keeps its own header line and carries a trail of the enclosing headers,
//! outermost first. Repeated header text is disambiguated by a 1-based
//! ordinal counting occurrences of the same text at the same level.
//!
//! Sections longer than `chunk_size` characters are re-split with the
//! recursive strategy; every resulting piece inherits the section's trail.

use std::collections::HashMap;

use crate::chunker::{validate_params, ChunkPiece, Chunker};
use crate::chunker_recursive::RecursiveChunker;
use crate::error::ProcessError;
use crate::models::HeaderRef;

pub struct MarkdownChunker {
    chunk_size: usize,
    header_levels: u8,
    fallback: RecursiveChunker,
}

impl MarkdownChunker {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
        header_levels: u8,
    ) -> Result<Self, ProcessError> {
        validate_params(chunk_size, chunk_overlap)?;
        if header_levels == 0 || header_levels > 3 {
            return Err(ProcessError::InvalidConfig(format!(
                "header_levels must be between 1 and 3, got {}",
                header_levels
            )));
        }
        Ok(Self {
            chunk_size,
            header_levels,
            fallback: RecursiveChunker::new(chunk_size, chunk_overlap, separators)?,
        })
    }

    /// Level and text of an ATX header within the tracked depth, if the
    /// line is one.
    fn parse_header(&self, line: &str) -> Option<(u8, String)> {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if level == 0 || level > self.header_levels as usize {
            return None;
        }
        let rest = &trimmed[level..];
        if !rest.starts_with(' ') {
            return None;
        }
        Some((level as u8, rest.trim().to_string()))
    }

    fn emit_section(
        &self,
        text: &str,
        start: usize,
        end: usize,
        trail: &[(u8, HeaderRef)],
        pieces: &mut Vec<ChunkPiece>,
    ) -> Result<(), ProcessError> {
        let section = text[start..end].trim_end();
        if section.trim().is_empty() {
            return Ok(());
        }
        let header_trail: Vec<HeaderRef> = trail.iter().map(|(_, h)| h.clone()).collect();

        if section.chars().count() <= self.chunk_size {
            let mut piece = ChunkPiece::new(section.to_string(), start);
            piece.header_trail = header_trail;
            pieces.push(piece);
            return Ok(());
        }

        for mut sub in self.fallback.split(section)? {
            sub.offset += start;
            sub.header_trail = header_trail.clone();
            pieces.push(sub);
        }
        Ok(())
    }
}

impl Chunker for MarkdownChunker {
    fn split(&self, text: &str) -> Result<Vec<ChunkPiece>, ProcessError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut pieces = Vec::new();
        let mut trail: Vec<(u8, HeaderRef)> = Vec::new();
        let mut ordinals: HashMap<(u8, String), u32> = HashMap::new();
        let mut section_start = 0usize;
        let mut offset = 0usize;

        for line in text.split_inclusive('\n') {
            if let Some((level, name)) = self.parse_header(line) {
                self.emit_section(text, section_start, offset, &trail, &mut pieces)?;

                let ordinal = ordinals.entry((level, name.clone())).or_insert(0);
                *ordinal += 1;
                trail.retain(|(l, _)| *l < level);
                trail.push((
                    level,
                    HeaderRef {
                        name,
                        index: *ordinal,
                    },
                ));
                section_start = offset;
            }
            offset += line.len();
        }
        self.emit_section(text, section_start, text.len(), &trail, &mut pieces)?;

        Ok(pieces)
    }
}
