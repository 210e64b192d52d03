//! Fixed-window character chunker.
//!
//! Windows of exactly `chunk_size` characters advance by
//! `chunk_size - chunk_overlap`, so each window repeats the final
//! `chunk_overlap` characters of its predecessor. The final window may be
//! shorter. Character counts, not bytes, drive the windows so multi-byte
//! text never splits mid-codepoint. A window that is entirely whitespace
//! is dropped rather than emitted (no chunk may be blank), so such inputs
//! do not reassemble into the original text.

use crate::chunker::{validate_params, ChunkPiece, Chunker};
use crate::error::ProcessError;

pub struct CharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ProcessError> {
        validate_params(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Chunker for CharacterChunker {
    fn split(&self, text: &str) -> Result<Vec<ChunkPiece>, ProcessError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Byte offset of every char, plus a sentinel for the end of text.
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        let n_chars = bounds.len() - 1;

        let stride = self.chunk_size - self.chunk_overlap;
        let mut pieces = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(n_chars);
            let slice = &text[bounds[start]..bounds[end]];
            if !slice.trim().is_empty() {
                pieces.push(ChunkPiece::new(slice.to_string(), bounds[start]));
            }
            if end == n_chars {
                break;
            }
            start += stride;
        }

        Ok(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(pieces: &[ChunkPiece]) -> Vec<&str> {
        pieces.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let chunker = CharacterChunker::new(4, 2).unwrap();
        let pieces = chunker.split("ABCDEFGHIJ").unwrap();
        assert_eq!(texts(&pieces), vec!["ABCD", "CDEF", "EFGH", "GHIJ"]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = CharacterChunker::new(100, 10).unwrap();
        let pieces = chunker.split("tiny").unwrap();
        assert_eq!(texts(&pieces), vec!["tiny"]);
        assert_eq!(pieces[0].offset, 0);
    }

    #[test]
    fn trailing_partial_window_is_kept() {
        let chunker = CharacterChunker::new(4, 1).unwrap();
        let pieces = chunker.split("ABCDEFGH").unwrap();
        assert_eq!(texts(&pieces), vec!["ABCD", "DEFG", "GH"]);
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let chunker = CharacterChunker::new(3, 1).unwrap();
        let pieces = chunker.split("héllö!").unwrap();
        assert_eq!(texts(&pieces), vec!["hél", "llö", "ö!"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let chunker = CharacterChunker::new(4, 2).unwrap();
        assert!(chunker.split("   \n\n  ").unwrap().is_empty());
    }

    #[test]
    fn offsets_point_into_source() {
        let chunker = CharacterChunker::new(4, 2).unwrap();
        let text = "ABCDEFGHIJ";
        for piece in chunker.split(text).unwrap() {
            assert!(text[piece.offset..].starts_with(&piece.text));
        }
    }
}
