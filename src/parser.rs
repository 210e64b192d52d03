//! Format dispatch: raw bytes to [`CanonicalDocument`].
//!
//! One [`DocumentParser`] is built per pipeline run and shared by the file
//! workers. The optional capabilities (structure extraction for remote PDF
//! parsing, image description for docx) are injected at construction so the
//! parsers themselves stay network-free in tests.

use std::sync::Arc;

use crate::config::{PdfParserKind, ProcessingConfig};
use crate::error::ProcessError;
use crate::models::{CanonicalDocument, FileType};
use crate::traits::{ImageDescriber, StructureExtractor};

pub struct DocumentParser {
    pdf_parser: PdfParserKind,
    extractor: Option<Arc<dyn StructureExtractor>>,
    describer: Option<Arc<dyn ImageDescriber>>,
}

impl DocumentParser {
    pub fn new(
        config: &ProcessingConfig,
        extractor: Option<Arc<dyn StructureExtractor>>,
        describer: Option<Arc<dyn ImageDescriber>>,
    ) -> Self {
        Self {
            pdf_parser: config.pdf_parser,
            extractor,
            describer,
        }
    }

    /// Parse one file's bytes according to its detected type.
    pub async fn parse(
        &self,
        file_type: FileType,
        bytes: &[u8],
    ) -> Result<CanonicalDocument, ProcessError> {
        match file_type {
            FileType::Text | FileType::Markdown => crate::parser_text::parse_text(bytes),
            FileType::Spreadsheet => crate::parser_sheet::parse_spreadsheet(bytes),
            FileType::WordProcessor => {
                crate::parser_docx::parse_docx(bytes, self.describer.as_deref()).await
            }
            FileType::Pdf => {
                crate::parser_pdf::parse_pdf(bytes, self.pdf_parser, self.extractor.as_deref())
                    .await
            }
        }
    }
}
