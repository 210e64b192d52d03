//! Plain-text and markdown parsing.
//!
//! Both formats are already canonical; the parser only validates encoding.
//! Markdown structure is left intact for the header-aware chunker.

use crate::error::ProcessError;
use crate::models::CanonicalDocument;

pub fn parse_text(bytes: &[u8]) -> Result<CanonicalDocument, ProcessError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ProcessError::UnsupportedFormat(format!("not valid UTF-8: {}", e)))?;

    Ok(CanonicalDocument {
        text: text.to_string(),
        ..CanonicalDocument::default()
    })
}
