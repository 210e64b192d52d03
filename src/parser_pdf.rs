//! PDF parsing.
//!
//! The primary path sends the raw bytes to the structure-extraction
//! service, which returns markdown with page-break markers; the markers
//! are stripped and recorded as page offsets so chunks can carry their
//! page number. The local fallback extracts plain text in-process with
//! `pdf-extract` and yields no page structure.

use crate::config::PdfParserKind;
use crate::error::ProcessError;
use crate::models::CanonicalDocument;
use crate::ocr::PAGE_BREAK_MARKER;
use crate::traits::StructureExtractor;

pub async fn parse_pdf(
    bytes: &[u8],
    kind: PdfParserKind,
    extractor: Option<&dyn StructureExtractor>,
) -> Result<CanonicalDocument, ProcessError> {
    match kind {
        PdfParserKind::Remote => {
            let extractor = extractor.ok_or_else(|| {
                ProcessError::InvalidConfig(
                    "pdf_parser = \"remote\" requires services.ocr to be configured".to_string(),
                )
            })?;
            let marked = extractor
                .extract(bytes)
                .await
                .map_err(|e| ProcessError::ExternalService(e.to_string()))?;
            Ok(from_marked_markdown(&marked))
        }
        PdfParserKind::Local => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| ProcessError::UnsupportedFormat(format!("PDF extraction: {}", e)))?;
            // Image-only PDFs extract to nothing locally.
            if text.trim().is_empty() {
                return Err(ProcessError::EmptyDocument);
            }
            Ok(CanonicalDocument {
                text,
                ..CanonicalDocument::default()
            })
        }
    }
}

/// Strip page-break markers from service output, recording where each page
/// starts in the stripped text. Page numbers are 1-based.
pub fn from_marked_markdown(marked: &str) -> CanonicalDocument {
    let mut text = String::new();
    let mut page_offsets = vec![(0usize, 1u32)];
    let mut page = 1u32;
    let mut rest = marked;

    while let Some(pos) = rest.find(PAGE_BREAK_MARKER) {
        text.push_str(&rest[..pos]);
        rest = &rest[pos + PAGE_BREAK_MARKER.len()..];
        page += 1;
        page_offsets.push((text.len(), page));
    }
    text.push_str(rest);

    CanonicalDocument {
        text,
        page_offsets,
        ..CanonicalDocument::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_become_page_offsets() {
        let marked = format!(
            "page one text{}page two text{}page three",
            PAGE_BREAK_MARKER, PAGE_BREAK_MARKER
        );
        let doc = from_marked_markdown(&marked);

        assert!(!doc.text.contains(PAGE_BREAK_MARKER));
        assert_eq!(doc.text, "page one textpage two textpage three");
        assert_eq!(doc.page_offsets.len(), 3);

        assert_eq!(doc.page_at(0), Some(1));
        assert_eq!(doc.page_at(12), Some(1));
        assert_eq!(doc.page_at(13), Some(2));
        assert_eq!(doc.page_at(27), Some(3));
        assert_eq!(doc.page_at(9999), Some(3));
    }

    #[test]
    fn single_page_has_one_offset() {
        let doc = from_marked_markdown("just one page");
        assert_eq!(doc.page_offsets, vec![(0, 1)]);
        assert_eq!(doc.page_at(5), Some(1));
    }

    #[tokio::test]
    async fn remote_without_extractor_is_invalid_config() {
        let err = parse_pdf(b"%PDF-1.4", PdfParserKind::Remote, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn local_rejects_garbage_bytes() {
        let err = parse_pdf(b"not a pdf at all", PdfParserKind::Local, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
    }

    fn one_page_pdf(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn local_extracts_text_without_page_structure() {
        let bytes = one_page_pdf("local extraction works");
        let doc = parse_pdf(&bytes, PdfParserKind::Local, None).await.unwrap();
        assert!(doc.text.contains("local extraction works"));
        assert!(doc.page_offsets.is_empty());
    }
}
