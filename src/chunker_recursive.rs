//! Separator-driven recursive chunker.
//!
//! The text is cut into consecutive segments of at most
//! `chunk_size - chunk_overlap` characters. Each cut prefers the coarsest
//! separator (`"\n\n"` before `"\n"` before `" "` by default) that occurs
//! inside the current budget, splitting after its last occurrence so the
//! separator stays with the preceding segment. When no separator fits, the
//! segment is cut hard at the budget.
//!
//! The emitted chunk for segment `i > 0` is the final `chunk_overlap`
//! characters of the previous chunk followed by the segment, so stripping
//! the overlap prefix from every chunk after the first reconstructs the
//! source text exactly. One exception: a segment that is entirely
//! whitespace is dropped rather than emitted (no chunk may be blank), so
//! inputs containing a whitespace run longer than a segment reconstruct
//! with that run missing.

use crate::chunker::{validate_params, ChunkPiece, Chunker};
use crate::error::ProcessError;

pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ProcessError> {
        validate_params(chunk_size, chunk_overlap)?;
        if separators.is_empty() {
            return Err(ProcessError::InvalidConfig(
                "recursive chunking requires at least one separator".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Segment starts, as character indices, covering the text without gaps.
    fn segment_starts(&self, chars: &[char]) -> Vec<usize> {
        let budget = self.chunk_size - self.chunk_overlap;
        let mut starts = vec![0usize];
        let mut pos = 0usize;

        while chars.len() - pos > budget {
            let limit = pos + budget;
            let cut = self
                .separators
                .iter()
                .find_map(|sep| last_separator_end(chars, pos, limit, sep))
                .unwrap_or(limit);
            starts.push(cut);
            pos = cut;
        }
        starts
    }
}

/// End index of the last occurrence of `sep` whose end lies in
/// `(pos, limit]`, or `None` when the window holds no usable occurrence.
fn last_separator_end(chars: &[char], pos: usize, limit: usize, sep: &str) -> Option<usize> {
    let sep: Vec<char> = sep.chars().collect();
    if sep.is_empty() || sep.len() > limit - pos {
        return None;
    }
    (pos..=limit - sep.len())
        .rev()
        .find(|&i| chars[i..i + sep.len()] == sep[..])
        .map(|i| i + sep.len())
        .filter(|&end| end > pos)
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Result<Vec<ChunkPiece>, ProcessError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<char> = text.chars().collect();
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());

        let starts = self.segment_starts(&chars);
        let mut pieces = Vec::new();

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(chars.len());
            let lead = start.saturating_sub(self.chunk_overlap);
            let slice = &text[bounds[lead]..bounds[end]];
            if !slice.trim().is_empty() {
                pieces.push(ChunkPiece::new(slice.to_string(), bounds[start]));
            }
        }

        Ok(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(
            size,
            overlap,
            vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn prefers_coarser_separators() {
        // Budget 20: the paragraph break at offset 12 wins over the later
        // single newline and spaces inside the window.
        let text = "first block\n\nsecond line\nthird line goes on";
        let c = chunker(20, 0);
        let pieces = c.split(text).unwrap();
        assert_eq!(pieces[0].text, "first block\n\n");
        assert!(pieces[1].text.starts_with("second line"));
    }

    #[test]
    fn falls_back_to_finer_separators() {
        let c = chunker(10, 0);
        let pieces = c.split("one two three four").unwrap();
        for piece in &pieces {
            assert!(piece.text.chars().count() <= 10);
        }
        assert_eq!(pieces[0].text, "one two ");
    }

    #[test]
    fn hard_splits_separator_free_text() {
        let c = chunker(5, 0);
        let pieces = c.split("ABCDEFGHIJKL").unwrap();
        let texts: Vec<&str> = pieces.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["ABCDE", "FGHIJ", "KL"]);
    }

    #[test]
    fn chunks_never_exceed_chunk_size() {
        let c = chunker(30, 8);
        let text = "lorem ipsum dolor sit amet\n\nconsectetur adipiscing elit sed\ndo eiusmod tempor incididunt ut labore";
        for piece in c.split(text).unwrap() {
            assert!(piece.text.chars().count() <= 30);
        }
    }

    #[test]
    fn stripping_overlap_reconstructs_source() {
        let overlap = 6;
        let c = chunker(24, overlap);
        let text = "alpha beta gamma delta\n\nepsilon zeta eta theta iota\nkappa lambda mu nu xi omicron pi";
        let pieces = c.split(text).unwrap();
        assert!(pieces.len() > 2);

        let mut rebuilt = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(&piece.text);
            } else {
                rebuilt.extend(piece.text.chars().skip(overlap));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn offsets_address_segment_starts() {
        let c = chunker(24, 6);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        for piece in c.split(text).unwrap() {
            // The piece minus its overlap prefix starts at `offset`.
            let own: String = piece
                .text
                .chars()
                .skip(if piece.offset == 0 { 0 } else { 6 })
                .collect();
            assert!(text[piece.offset..].starts_with(&own));
        }
    }

    #[test]
    fn whitespace_only_segments_are_dropped() {
        // A whitespace run wider than the budget fills a whole segment;
        // that segment is dropped and never emitted as a blank chunk.
        let c = chunker(8, 0);
        let text = format!("start{}end", " ".repeat(20));
        let pieces = c.split(&text).unwrap();
        assert!(pieces.iter().all(|p| !p.text.trim().is_empty()));
        assert!(pieces.iter().any(|p| p.text.contains("start")));
        assert!(pieces.iter().any(|p| p.text.contains("end")));
    }

    #[test]
    fn empty_separator_list_is_rejected() {
        assert!(matches!(
            RecursiveChunker::new(10, 2, Vec::new()),
            Err(ProcessError::InvalidConfig(_))
        ));
    }
}
