//! Word document (docx) parsing.
//!
//! Walks `word/document.xml` paragraph by paragraph. Paragraphs styled
//! `Heading1`..`Heading3` become markdown ATX headers so the header-aware
//! chunker sees the document's structure. Embedded images are resolved
//! through the relationships part and handed to the [`ImageDescriber`];
//! a described image contributes an `[Image: ...]` line, and any image
//! that cannot be described is counted as an unprocessed artifact rather
//! than failing the file.

use std::collections::HashMap;
use std::io::Read;

use crate::error::ProcessError;
use crate::models::CanonicalDocument;
use crate::traits::ImageDescriber;

const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Decompressed ceiling for one embedded image.
const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

enum Part {
    Text(String),
    Image(String),
}

struct Paragraph {
    heading: Option<u8>,
    parts: Vec<Part>,
}

pub async fn parse_docx(
    bytes: &[u8],
    describer: Option<&dyn ImageDescriber>,
) -> Result<CanonicalDocument, ProcessError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ProcessError::UnsupportedFormat(format!("not a docx archive: {}", e)))?;

    let doc_xml = read_entry(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?
        .ok_or_else(|| {
            ProcessError::UnsupportedFormat("word/document.xml not found".to_string())
        })?;
    let rels = read_relationships(&mut archive)?;
    let paragraphs = parse_paragraphs(&doc_xml)?;

    let mut out = String::new();
    let mut unprocessed = 0usize;

    for para in paragraphs {
        let mut line = String::new();
        if let Some(level) = para.heading {
            for _ in 0..level {
                line.push('#');
            }
            line.push(' ');
        }
        for part in para.parts {
            match part {
                Part::Text(t) => line.push_str(&t),
                Part::Image(rel_id) => {
                    match describe_image(&mut archive, &rels, &rel_id, describer).await {
                        Some(description) => {
                            if !line.is_empty() {
                                line.push(' ');
                            }
                            line.push_str(&format!("[Image: {}]", description));
                        }
                        None => unprocessed += 1,
                    }
                }
            }
        }
        if !line.trim().is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(line.trim_end());
        }
    }

    Ok(CanonicalDocument {
        text: out,
        unprocessed_artifacts: unprocessed,
        ..CanonicalDocument::default()
    })
}

async fn describe_image(
    archive: &mut Archive<'_>,
    rels: &HashMap<String, String>,
    rel_id: &str,
    describer: Option<&dyn ImageDescriber>,
) -> Option<String> {
    let describer = describer?;
    let target = rels.get(rel_id)?;
    let entry = if target.starts_with('/') {
        target.trim_start_matches('/').to_string()
    } else {
        format!("word/{}", target)
    };
    let image = read_entry(archive, &entry, MAX_IMAGE_BYTES).ok()??;
    describer.describe(&image).await.ok()
}

fn read_entry(
    archive: &mut Archive,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ProcessError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ProcessError::UnsupportedFormat(e.to_string())),
    };
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ProcessError::UnsupportedFormat(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ProcessError::UnsupportedFormat(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(Some(out))
}

/// Relationship id to target map from `word/_rels/document.xml.rels`.
fn read_relationships(archive: &mut Archive) -> Result<HashMap<String, String>, ProcessError> {
    let xml = match read_entry(archive, "word/_rels/document.xml.rels", MAX_XML_ENTRY_BYTES)? {
        Some(xml) => xml,
        None => return Ok(HashMap::new()),
    };
    let mut rels = HashMap::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e))
            | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = None;
                    let mut target = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => {
                                id = Some(String::from_utf8_lossy(attr.value.as_ref()).into_owned())
                            }
                            b"Target" => {
                                target =
                                    Some(String::from_utf8_lossy(attr.value.as_ref()).into_owned())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(target)) = (id, target) {
                        rels.insert(id, target);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ProcessError::UnsupportedFormat(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn parse_paragraphs(xml: &[u8]) -> Result<Vec<Paragraph>, ProcessError> {
    let mut paragraphs = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut current: Option<Paragraph> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    current = Some(Paragraph {
                        heading: None,
                        parts: Vec::new(),
                    });
                }
                b"t" => in_t = true,
                b"pStyle" | b"blip" => {
                    handle_marker(&e, &mut current);
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"pStyle" | b"blip") {
                    handle_marker(&e, &mut current);
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                if let Some(para) = current.as_mut() {
                    let text = te.unescape().unwrap_or_default().into_owned();
                    match para.parts.last_mut() {
                        Some(Part::Text(existing)) => existing.push_str(&text),
                        _ => para.parts.push(Part::Text(text)),
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    if let Some(para) = current.take() {
                        paragraphs.push(para);
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ProcessError::UnsupportedFormat(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

fn handle_marker(e: &quick_xml::events::BytesStart, current: &mut Option<Paragraph>) {
    let Some(para) = current.as_mut() else {
        return;
    };
    match e.local_name().as_ref() {
        b"pStyle" => {
            for attr in e.attributes().flatten() {
                if attr.key.local_name().as_ref() == b"val" {
                    para.heading = heading_level(&String::from_utf8_lossy(attr.value.as_ref()));
                }
            }
        }
        b"blip" => {
            for attr in e.attributes().flatten() {
                if attr.key.local_name().as_ref() == b"embed" {
                    para.parts.push(Part::Image(
                        String::from_utf8_lossy(attr.value.as_ref()).into_owned(),
                    ));
                }
            }
        }
        _ => {}
    }
}

/// Markdown level for `Heading1`..`Heading3` paragraph styles.
fn heading_level(style: &str) -> Option<u8> {
    let digits = style.strip_prefix("Heading")?;
    match digits.parse::<u8>().ok()? {
        level @ 1..=3 => Some(level),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    struct FakeDescriber {
        fail: bool,
    }

    #[async_trait]
    impl ImageDescriber for FakeDescriber {
        async fn describe(&self, _image: &[u8]) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("vision service down");
            }
            Ok("a bar chart of quarterly sales".to_string())
        }
    }

    fn docx(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, content) in entries {
                writer
                    .start_file(name.to_string(), SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    const DOC_WITH_HEADINGS: &str = r#"<w:document>
        <w:body>
            <w:p>
                <w:pPr><w:pStyle w:val="Heading1"/></w:pPr>
                <w:r><w:t>Overview</w:t></w:r>
            </w:p>
            <w:p><w:r><w:t>First paragraph </w:t></w:r><w:r><w:t>continues.</w:t></w:r></w:p>
            <w:p>
                <w:pPr><w:pStyle w:val="Heading2"/></w:pPr>
                <w:r><w:t>Details</w:t></w:r>
            </w:p>
            <w:p><w:r><w:t>Body text.</w:t></w:r></w:p>
        </w:body>
    </w:document>"#;

    #[tokio::test]
    async fn headings_become_markdown_headers() {
        let bytes = docx(&[("word/document.xml", DOC_WITH_HEADINGS.as_bytes())]);
        let doc = parse_docx(&bytes, None).await.unwrap();
        assert_eq!(
            doc.text,
            "# Overview\n\nFirst paragraph continues.\n\n## Details\n\nBody text."
        );
        assert_eq!(doc.unprocessed_artifacts, 0);
    }

    const DOC_WITH_IMAGE: &str = r#"<w:document><w:body>
        <w:p><w:r><w:t>See figure:</w:t></w:r>
            <w:r><w:drawing><a:blip r:embed="rId7"/></w:drawing></w:r>
        </w:p>
    </w:body></w:document>"#;

    const RELS_WITH_IMAGE: &str = r#"<Relationships>
        <Relationship Id="rId7" Type="image" Target="media/image1.png"/>
    </Relationships>"#;

    fn docx_with_image() -> Vec<u8> {
        docx(&[
            ("word/document.xml", DOC_WITH_IMAGE.as_bytes()),
            ("word/_rels/document.xml.rels", RELS_WITH_IMAGE.as_bytes()),
            ("word/media/image1.png", b"\x89PNG fake bytes"),
        ])
    }

    #[tokio::test]
    async fn images_are_described_inline() {
        let describer = FakeDescriber { fail: false };
        let doc = parse_docx(&docx_with_image(), Some(&describer)).await.unwrap();
        assert_eq!(
            doc.text,
            "See figure: [Image: a bar chart of quarterly sales]"
        );
        assert_eq!(doc.unprocessed_artifacts, 0);
    }

    #[tokio::test]
    async fn failed_description_counts_as_unprocessed() {
        let describer = FakeDescriber { fail: true };
        let doc = parse_docx(&docx_with_image(), Some(&describer)).await.unwrap();
        assert_eq!(doc.text, "See figure:");
        assert_eq!(doc.unprocessed_artifacts, 1);
    }

    #[tokio::test]
    async fn missing_describer_counts_as_unprocessed() {
        let doc = parse_docx(&docx_with_image(), None).await.unwrap();
        assert_eq!(doc.unprocessed_artifacts, 1);
    }

    #[tokio::test]
    async fn missing_document_xml_is_unsupported() {
        let bytes = docx(&[("word/other.xml", b"<x/>")]);
        let err = parse_docx(&bytes, None).await.unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat(_)));
    }
}
