//! Plain-text extraction for the supported document formats.
//!
//! The loader hands this module raw file bytes plus a [`DocumentKind`]
//! derived from the file extension; it gets back UTF-8 text or an
//! [`ExtractError`] and decides on its own to skip the file.
//!
//! | Kind | Output |
//! |------|--------|
//! | text (`.txt`, `.md`) | UTF-8, falling back to ISO-8859-1 |
//! | `.docx` | body paragraphs joined with `\n` |
//! | `.pdf` | pages joined with `\n` |
//! | `.xlsx` / `.xls` | `=== Sheet: <name> ===` header + CSV per sheet |

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Maximum number of sheets to read from one workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to keep per sheet, counting padding and empty rows
/// (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Last column Excel can address (`XFD`), zero-based.
const XLSX_MAX_COLUMN: usize = 16_383;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

type ZipArchive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// File formats the loader knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Docx,
    Pdf,
    Xlsx,
    Xls,
}

impl DocumentKind {
    /// Maps a file extension (without the dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "md" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
}

fn ooxml(err: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(err.to_string())
}

/// Extracts plain text from file content. An empty input is an empty
/// document for every kind.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    match kind {
        DocumentKind::Text => Ok(decode_text(bytes)),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Xlsx => extract_xlsx(bytes),
        DocumentKind::Xls => extract_xls(bytes),
    }
}

/// Decodes UTF-8, or ISO-8859-1 when the bytes are not valid UTF-8.
/// ISO-8859-1 maps every byte to the code point of the same value, so this
/// never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

// ============ PDF ============

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract can panic on malformed streams; that must only cost this file.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages.join("\n"))
}

// ============ ZIP helpers ============

fn open_zip(bytes: &[u8]) -> Result<ZipArchive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml)
}

fn has_entry(archive: &ZipArchive<'_>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

fn read_zip_entry_bounded(
    archive: &mut ZipArchive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml)?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out).map_err(ooxml)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Value of the attribute whose local name is `name` (namespace prefix ignored).
fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

// ============ DOCX ============

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    if !has_entry(&archive, "word/document.xml") {
        return Err(ExtractError::Ooxml(
            "word/document.xml not found".to_string(),
        ));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    Ok(body_paragraphs(&xml)?.join("\n"))
}

/// Text of every body-level `w:p`, in document order. Paragraphs nested in
/// tables, text boxes or content controls (`w:sdt`) are not body paragraphs.
fn body_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut nested = 0usize;
    let mut in_run = false;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" | b"txbxContent" | b"sdtContent" => nested += 1,
                b"p" if nested == 0 => current = Some(String::new()),
                b"r" => in_run = true,
                b"t" if nested == 0 && in_run => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if nested == 0 => {
                match e.local_name().as_ref() {
                    b"p" => paragraphs.push(String::new()),
                    b"tab" if in_run => {
                        if let Some(p) = current.as_mut() {
                            p.push('\t');
                        }
                    }
                    b"br" | b"cr" if in_run => {
                        if let Some(p) = current.as_mut() {
                            p.push('\n');
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(te)) if in_t => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&te.unescape().map_err(ooxml)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"tbl" | b"txbxContent" | b"sdtContent" => nested = nested.saturating_sub(1),
                b"p" if nested == 0 => {
                    if let Some(p) = current.take() {
                        paragraphs.push(p);
                    }
                }
                b"r" => in_run = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

// ============ XLSX ============

type SheetRows = Vec<Vec<String>>;

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = list_worksheets(&mut archive)?;
    let mut rendered = Vec::with_capacity(sheets.len().min(XLSX_MAX_SHEETS));
    for (name, path) in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_zip_entry_bounded(&mut archive, &path, MAX_XML_ENTRY_BYTES)?;
        rendered.push((name, parse_sheet_rows(&xml, &shared_strings)?));
    }
    Ok(render_sheets(&rendered))
}

fn read_shared_strings(archive: &mut ZipArchive<'_>) -> Result<Vec<String>, ExtractError> {
    // Workbooks without any text cells have no shared string table.
    if !has_entry(archive, "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_phonetic = false;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" if current.is_some() && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(ooxml)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Worksheets as `(sheet name, zip entry path)` in workbook order.
fn list_worksheets(archive: &mut ZipArchive<'_>) -> Result<Vec<(String, String)>, ExtractError> {
    if has_entry(archive, "xl/workbook.xml") && has_entry(archive, "xl/_rels/workbook.xml.rels") {
        let workbook = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
        let rels =
            read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)?;
        let targets = parse_relationships(&rels)?;
        let sheets: Vec<(String, String)> = parse_workbook_sheets(&workbook)?
            .into_iter()
            .filter_map(|(name, rel_id)| {
                targets
                    .get(&rel_id)
                    .map(|target| (name, resolve_part_path(target)))
            })
            .collect();
        if !sheets.is_empty() {
            return Ok(sheets);
        }
    }

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| sheet_number(name).unwrap_or(u32::MAX));
    Ok(names
        .into_iter()
        .enumerate()
        .map(|(idx, path)| {
            let n = sheet_number(&path).unwrap_or(idx as u32 + 1);
            (format!("Sheet{}", n), path)
        })
        .collect())
}

fn sheet_number(path: &str) -> Option<u32> {
    path.trim_start_matches("xl/worksheets/sheet")
        .trim_end_matches(".xml")
        .parse::<u32>()
        .ok()
}

/// `<sheet name=".." r:id=".."/>` entries of `xl/workbook.xml`.
fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>, ExtractError> {
    let mut sheets = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    if let (Some(name), Some(id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                        sheets.push((name, id));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, ExtractError> {
    let mut targets = HashMap::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                        targets.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Zero-based column index of a cell reference such as `AB12`, or `None`
/// when the reference has no column letters. Columns past `XFD` are an error.
fn column_index(cell_ref: &str) -> Result<Option<usize>, ExtractError> {
    let mut col = 0usize;
    let mut seen = false;
    for c in cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        col = col
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .filter(|&v| v <= XLSX_MAX_COLUMN + 1)
            .ok_or_else(|| column_out_of_range(cell_ref))?;
        seen = true;
    }
    Ok(seen.then(|| col - 1))
}

fn column_out_of_range(cell_ref: &str) -> ExtractError {
    ExtractError::Ooxml(format!("cell reference {:?} is past column XFD", cell_ref))
}

#[derive(Clone, Copy)]
enum Capture {
    Value,
    Inline,
}

struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn from_start(e: &BytesStart<'_>, next_column: usize) -> Result<Self, ExtractError> {
        let column = match attr(e, b"r") {
            Some(r) => column_index(&r)?.unwrap_or(next_column),
            None => next_column,
        };
        if column > XLSX_MAX_COLUMN {
            return Err(ExtractError::Ooxml(format!(
                "cell in column {} is past column XFD",
                column + 1
            )));
        }
        Ok(Self {
            column,
            cell_type: attr(e, b"t"),
            value: String::new(),
            inline: String::new(),
        })
    }

    fn resolve(self, shared_strings: &[String]) -> String {
        match self.cell_type.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .cloned()
                .unwrap_or_default(),
            Some("b") => {
                if self.value.trim() == "1" {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            Some("inlineStr") => self.inline,
            _ => self.value,
        }
    }
}

fn place_cell(row: &mut Vec<String>, column: usize, value: String) {
    if column >= row.len() {
        row.resize(column, String::new());
        row.push(value);
    } else {
        row[column] = value;
    }
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<SheetRows, ExtractError> {
    let mut rows = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut capture: Option<Capture> = None;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            tracing::warn!(
                limit = XLSX_MAX_CELLS_PER_SHEET,
                "sheet truncated at the cell limit"
            );
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next = row.as_ref().map_or(0, |r| r.len());
                    cell = Some(PendingCell::from_start(&e, next)?);
                }
                b"v" if cell.is_some() => capture = Some(Capture::Value),
                b"t" if cell.is_some() => capture = Some(Capture::Inline),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"row" {
                    rows.push(Vec::new());
                    cell_count += 1;
                }
            }
            Ok(Event::Text(te)) => {
                if let (Some(kind), Some(c)) = (capture, cell.as_mut()) {
                    let text = te.unescape().map_err(ooxml)?;
                    match kind {
                        Capture::Value => c.value.push_str(&text),
                        Capture::Inline => c.inline.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = None,
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        let column = c.column;
                        place_cell(r, column, c.resolve(shared_strings));
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        cell_count += r.len().max(1);
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

// ============ XLS ============

fn extract_xls(bytes: &[u8]) -> Result<String, ExtractError> {
    // Renamed .xlsx files are common; read them as what they are.
    if bytes.starts_with(ZIP_MAGIC) {
        return extract_xlsx(bytes);
    }

    use calamine::Reader as _;

    let mut workbook = calamine::Xls::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names().into_iter().take(XLSX_MAX_SHEETS) {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Spreadsheet(format!("sheet {}: {}", name, e)))?;
        let rows: SheetRows = range
            .rows()
            .map(|r| r.iter().map(xls_cell_text).collect())
            .collect();
        sheets.push((name, rows));
    }
    Ok(render_sheets(&sheets))
}

/// Booleans render as in the XLSX path; everything else uses calamine's
/// own display (`120.0` shows as `120`).
fn xls_cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Bool(true) => "TRUE".to_string(),
        calamine::Data::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

// ============ Sheet rendering ============

fn render_sheets(sheets: &[(String, SheetRows)]) -> String {
    let mut parts = Vec::with_capacity(sheets.len() * 2);
    for (name, rows) in sheets {
        parts.push(format!("=== Sheet: {} ===", name));
        parts.push(rows_to_csv(rows));
    }
    parts.join("\n")
}

/// Renders rows as CSV, padding every row to the widest one. Each row,
/// including the last, ends with `\n`. Output stops once the padded grid
/// would exceed the per-sheet cell limit.
fn rows_to_csv(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let max_rows = XLSX_MAX_CELLS_PER_SHEET / width.max(1);
    let mut out = String::new();
    for row in rows.iter().take(max_rows) {
        let fields: Vec<String> = (0..width)
            .map(|i| csv_field(row.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"{}\"><w:body>{}</w:body></w:document>",
            W_NS, body
        );
        zip_of(&[("word/document.xml", &xml)])
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("MD"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_extension("Xls"), Some(DocumentKind::Xls));
        assert_eq!(
            DocumentKind::from_path(Path::new("report.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_path(Path::new("image.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn empty_input_is_empty_text_for_every_kind() {
        for kind in [
            DocumentKind::Text,
            DocumentKind::Docx,
            DocumentKind::Pdf,
            DocumentKind::Xlsx,
            DocumentKind::Xls,
        ] {
            assert_eq!(extract_text(b"", kind).unwrap(), "");
        }
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        let text = extract_text(b"caf\xe9 \xff", DocumentKind::Text).unwrap();
        assert_eq!(text, "café ÿ");
    }

    #[test]
    fn utf8_text_is_kept() {
        let text = extract_text("文件內容".as_bytes(), DocumentKind::Text).unwrap();
        assert_eq!(text, "文件內容");
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", DocumentKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_without_document_part_is_an_error() {
        let bytes = zip_of(&[("word/styles.xml", "<styles/>")]);
        let err = extract_text(&bytes, DocumentKind::Docx).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn docx_paragraphs_are_joined_with_newlines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>line</w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr>\
             <w:r><w:t>a</w:t><w:tab/><w:t>b &amp; c</w:t></w:r></w:p>",
        );
        let text = extract_text(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(text, "First line\n\na\tb & c");
    }

    #[test]
    fn docx_table_paragraphs_are_not_body_paragraphs() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>before</w:t></w:r></w:p>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>\
             <w:p><w:r><w:t>after</w:t></w:r></w:p>",
        );
        let text = extract_text(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(text, "before\nafter");
    }

    #[test]
    fn docx_content_control_paragraphs_are_not_body_paragraphs() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>before</w:t></w:r></w:p>\
             <w:sdt><w:sdtPr/><w:sdtContent>\
             <w:p><w:r><w:t>inside control</w:t></w:r></w:p>\
             </w:sdtContent></w:sdt>\
             <w:p><w:r><w:t>after</w:t></w:r></w:p>",
        );
        let text = extract_text(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(text, "before\nafter");
    }

    fn one_sheet_xlsx(sheet_xml: &str) -> Vec<u8> {
        zip_of(&[("xl/worksheets/sheet1.xml", sheet_xml)])
    }

    #[test]
    fn cell_reference_past_last_column_is_an_error() {
        let bytes = one_sheet_xlsx(
            r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#,
        );
        let err = extract_text(&bytes, DocumentKind::Xlsx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)), "got: {:?}", err);
    }

    #[test]
    fn column_letters_that_overflow_are_an_error() {
        assert!(column_index("XFE1").is_err());
        assert!(matches!(
            column_index(&"Z".repeat(20)),
            Err(ExtractError::Ooxml(_))
        ));
    }

    #[test]
    fn cells_without_reference_stop_at_last_column() {
        let cells = "<c><v>1</v></c>".repeat(XLSX_MAX_COLUMN + 2);
        let bytes = one_sheet_xlsx(&format!(
            "<worksheet><sheetData><row>{}</row></sheetData></worksheet>",
            cells
        ));
        assert!(matches!(
            extract_text(&bytes, DocumentKind::Xlsx),
            Err(ExtractError::Ooxml(_))
        ));
    }

    #[test]
    fn sheet_rows_stop_at_cell_limit() {
        let xml = format!(
            "<worksheet><sheetData>{}</sheetData></worksheet>",
            "<row/>".repeat(XLSX_MAX_CELLS_PER_SHEET + 10)
        );
        let rows = parse_sheet_rows(xml.as_bytes(), &[]).unwrap();
        assert_eq!(rows.len(), XLSX_MAX_CELLS_PER_SHEET);
    }

    #[test]
    fn wide_rows_are_rendered_up_to_cell_limit() {
        let mut rows = vec![vec![String::new(); XLSX_MAX_COLUMN + 1]];
        rows.extend((0..10).map(|i| vec![i.to_string()]));
        let csv = rows_to_csv(&rows);
        assert_eq!(
            csv.lines().count(),
            XLSX_MAX_CELLS_PER_SHEET / (XLSX_MAX_COLUMN + 1)
        );
    }

    #[test]
    fn workbook_sheet_count_is_capped() {
        let names: Vec<String> = (1..=XLSX_MAX_SHEETS + 5)
            .map(|n| format!("xl/worksheets/sheet{}.xml", n))
            .collect();
        let entries: Vec<(&str, &str)> = names
            .iter()
            .map(|n| (n.as_str(), "<worksheet><sheetData/></worksheet>"))
            .collect();
        let text = extract_text(&zip_of(&entries), DocumentKind::Xlsx).unwrap();
        assert_eq!(text.matches("=== Sheet: ").count(), XLSX_MAX_SHEETS);
        assert!(!text.contains(&format!("Sheet{} ===", XLSX_MAX_SHEETS + 1)));
    }

    fn sample_xlsx() -> Vec<u8> {
        zip_of(&[
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Prices" sheetId="1" r:id="rId2"/><sheet name="Notes" sheetId="2" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet2.xml"/><Relationship Id="rId2" Target="/xl/worksheets/sheet1.xml"/></Relationships>"#,
            ),
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>item</t></si><si><t>price</t></si><si><r><t>tea, </t></r><r><t>green</t></r></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>3.5</v></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>say "hi"</t></is></c><c r="B1" t="b"><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ])
    }

    #[test]
    fn xlsx_sheets_render_in_workbook_order_with_names() {
        let text = extract_text(&sample_xlsx(), DocumentKind::Xlsx).unwrap();
        assert_eq!(
            text,
            "=== Sheet: Prices ===\nitem,price,\n\"tea, green\",,3.5\n\n=== Sheet: Notes ===\n\"say \"\"hi\"\"\",TRUE\n"
        );
    }

    #[test]
    fn xls_extension_accepts_zip_workbooks() {
        let text = extract_text(&sample_xlsx(), DocumentKind::Xls).unwrap();
        assert!(text.starts_with("=== Sheet: Prices ==="));
    }

    #[test]
    fn xlsx_without_workbook_falls_back_to_numbered_sheets() {
        let bytes = zip_of(&[
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row><c><v>2</v></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row><c><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ]);
        let text = extract_text(&bytes, DocumentKind::Xlsx).unwrap();
        assert_eq!(text, "=== Sheet: Sheet1 ===\n1\n\n=== Sheet: Sheet2 ===\n2\n");
    }

    #[test]
    fn invalid_xls_returns_error() {
        let err = extract_text(b"definitely not biff", DocumentKind::Xls).unwrap_err();
        assert!(matches!(err, ExtractError::Spreadsheet(_)));
    }

    #[test]
    fn column_index_reads_letters_only() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AB12").unwrap(), Some(27));
        assert_eq!(column_index("XFD1").unwrap(), Some(XLSX_MAX_COLUMN));
        assert_eq!(column_index("12").unwrap(), None);
    }
}
