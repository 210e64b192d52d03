//! Spreadsheet (xlsx) parsing.
//!
//! Reads the OOXML package directly with `zip` + `quick-xml`: shared strings
//! first, then each worksheet grid in workbook order. Every sheet is
//! rendered as a markdown pipe table with the sheet name as a heading; the
//! processor later pairs each table with a generated summary.

use std::io::Read;

use crate::error::ProcessError;
use crate::models::{CanonicalDocument, SheetTable};

/// Sheets beyond this are ignored.
const MAX_SHEETS: usize = 100;
/// Decompressed byte ceiling per ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

pub fn parse_spreadsheet(bytes: &[u8]) -> Result<CanonicalDocument, ProcessError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ProcessError::UnsupportedFormat(format!("not an xlsx archive: {}", e)))?;

    let shared_strings = read_shared_strings(&mut archive)?;
    let names = read_sheet_names(&mut archive)?;
    let files = list_worksheet_files(&archive);

    let mut tables = Vec::new();
    for (i, file) in files.into_iter().take(MAX_SHEETS).enumerate() {
        let xml = read_entry(&mut archive, &file, MAX_XML_ENTRY_BYTES)?
            .ok_or_else(|| ProcessError::UnsupportedFormat(format!("{} missing", file)))?;
        let rows = parse_sheet_grid(&xml, &shared_strings)?;
        if rows.is_empty() {
            continue;
        }
        let sheet_name = names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", i + 1));
        let markdown = render_markdown_table(&sheet_name, &rows);
        tables.push(SheetTable {
            sheet_name,
            markdown,
        });
    }

    let text = tables
        .iter()
        .map(|t| t.markdown.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(CanonicalDocument {
        text,
        tables,
        ..CanonicalDocument::default()
    })
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

fn read_shared_strings(archive: &mut Archive) -> Result<Vec<String>, ProcessError> {
    let xml = match read_entry(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)? {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ProcessError::UnsupportedFormat(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Sheet display names in workbook order, from `xl/workbook.xml`.
fn read_sheet_names(archive: &mut Archive) -> Result<Vec<String>, ProcessError> {
    let xml = match read_entry(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)? {
        Some(xml) => xml,
        None => return Ok(Vec::new()),
    };
    let mut names = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e))
            | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            names.push(
                                String::from_utf8_lossy(attr.value.as_ref()).into_owned(),
                            );
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ProcessError::UnsupportedFormat(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

fn list_worksheet_files(archive: &Archive) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Cell value grid of one worksheet, row-major, gaps filled with "".
fn parse_sheet_grid(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>, ProcessError> {
    #[derive(PartialEq)]
    enum CellKind {
        Shared,
        InlineStr,
        Literal,
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut row: Vec<String> = Vec::new();
    let mut col = 0usize;
    let mut kind = CellKind::Literal;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e))
            | Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row.clear();
                    col = 0;
                }
                b"c" => {
                    kind = CellKind::Literal;
                    let mut explicit_col = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => {
                                explicit_col = column_index(attr.value.as_ref());
                            }
                            b"t" => {
                                kind = match attr.value.as_ref() {
                                    b"s" => CellKind::Shared,
                                    b"inlineStr" => CellKind::InlineStr,
                                    _ => CellKind::Literal,
                                };
                            }
                            _ => {}
                        }
                    }
                    col = explicit_col.unwrap_or(col);
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::InlineStr => in_value = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                let value = match kind {
                    CellKind::Shared => raw
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared.get(i).cloned())
                        .unwrap_or_default(),
                    _ => raw.into_owned(),
                };
                while row.len() <= col {
                    row.push(String::new());
                }
                row[col] = value;
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => col += 1,
                b"row" => {
                    if row.iter().any(|c| !c.trim().is_empty()) {
                        rows.push(row.clone());
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
    Ok(rows)
}

/// 0-based column index from a cell reference like `C7`.
fn column_index(reference: &[u8]) -> Option<usize> {
    let letters: Vec<u8> = reference
        .iter()
        .copied()
        .take_while(|b| b.is_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut idx = 0usize;
    for b in letters {
        idx = idx * 26 + (b - b'A' + 1) as usize;
    }
    Some(idx - 1)
}

fn render_markdown_table(sheet_name: &str, rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let cell = |row: &[String], i: usize| -> String {
        row.get(i)
            .map(|c| c.replace('\n', " ").replace('|', "\\|"))
            .unwrap_or_default()
    };

    let mut out = format!("## {}\n\n", sheet_name);
    for (ri, row) in rows.iter().enumerate() {
        out.push('|');
        for i in 0..width {
            out.push(' ');
            out.push_str(&cell(row, i));
            out.push_str(" |");
        }
        out.push('\n');
        if ri == 0 {
            out.push('|');
            for _ in 0..width {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}
