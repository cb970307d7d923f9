//! XLSX workbook reader implementation.

use present_core::ooxml::{attribute, local_name, read_file_from_archive};
use present_core::{CellValue, Error, Result, Row, Sheet};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
/// Columns in a worksheet, `A` through `XFD`.
const MAX_COLUMNS: usize = 16_384;

/// Reader for XLSX (Office Open XML) workbooks.
pub struct XlsxReader;

impl XlsxReader {
    /// Create a new XLSX reader.
    pub fn new() -> Self {
        Self
    }

    /// Open and read a workbook from disk.
    pub fn open(&self, path: &Path) -> Result<Vec<Sheet>> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        self.read(std::io::BufReader::new(file))
    }

    /// Read every sheet, in workbook order.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<Vec<Sheet>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let has_shared = archive.by_name(SHARED_STRINGS_PATH).is_ok();
        let shared = if has_shared {
            parse_shared_strings(&read_file_from_archive(&mut archive, SHARED_STRINGS_PATH)?)?
        } else {
            Vec::new()
        };

        let entries = self.sheet_entries(&mut archive)?;
        let mut sheets = Vec::with_capacity(entries.len());

        for (name, part) in entries {
            log::debug!("Reading sheet '{}' from {}", name, part);
            let content = read_file_from_archive(&mut archive, &part)?;
            let grid = parse_sheet_cells(&content, &shared)?;
            sheets.push(build_sheet(name, grid));
        }

        Ok(sheets)
    }

    /// Sheet names paired with their part paths, in workbook order.
    fn sheet_entries<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<(String, String)>> {
        let workbook = read_file_from_archive(archive, WORKBOOK_PATH)?;
        let rels = read_file_from_archive(archive, WORKBOOK_RELS_PATH)?;

        let targets = parse_relationships(&rels)?;
        let mut entries = Vec::new();

        let mut reader = Reader::from_str(&workbook);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sheet" =>
                {
                    let name = attribute(e, b"name").unwrap_or_default();
                    let rel_id = attribute(e, b"id").ok_or_else(|| {
                        Error::WorkbookError(format!("Sheet '{}' has no relationship id", name))
                    })?;

                    let target = targets
                        .iter()
                        .find(|(id, _)| *id == rel_id)
                        .map(|(_, target)| target.clone())
                        .ok_or_else(|| {
                            Error::WorkbookError(format!(
                                "Sheet '{}' points at unknown relationship {}",
                                name, rel_id
                            ))
                        })?;

                    entries.push((name, part_path(&target)));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing workbook: {}", e)));
                }
                _ => {}
            }
        }

        Ok(entries)
    }
}

impl Default for XlsxReader {
    fn default() -> Self {
        Self::new()
    }
}

/// `(Id, Target)` pairs from a relationships part.
fn parse_relationships(xml: &str) -> Result<Vec<(String, String)>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id"), attribute(e, b"Target")) {
                    rels.push((id, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Parse `xl/sharedStrings.xml`, concatenating rich-text runs and skipping phonetic hints.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if local_name(e.name().as_ref()) == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if in_si && in_t && !in_phonetic {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("Bad shared string: {}", e)))?;
                    current.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if in_si && in_t && !in_phonetic {
                    current.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing shared strings: {}", e)));
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Cell type as declared by the `t` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Number,
    SharedString,
    InlineString,
    FormulaString,
    Bool,
    Error,
}

impl CellKind {
    fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("s") => CellKind::SharedString,
            Some("inlineStr") => CellKind::InlineString,
            Some("str") | Some("d") => CellKind::FormulaString,
            Some("b") => CellKind::Bool,
            Some("e") => CellKind::Error,
            _ => CellKind::Number,
        }
    }
}

/// In-progress cell while walking a worksheet.
struct PendingCell {
    column: usize,
    kind: CellKind,
    raw: String,
}

/// Parse a worksheet into rows of `(column, value)` pairs, in document order.
fn parse_sheet_cells(xml: &str, shared: &[String]) -> Result<Vec<Vec<(usize, CellValue)>>> {
    let mut rows = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current_row: Option<Vec<(usize, CellValue)>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut next_column = 0usize;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"row" => {
                    current_row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => {
                    let column = attribute(e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column);
                    next_column = column + 1;
                    cell = Some(PendingCell {
                        column,
                        kind: CellKind::from_attr(attribute(e, b"t").as_deref()),
                        raw: String::new(),
                    });
                }
                b"v" => in_value = true,
                // Inline strings keep their text in <is><t>.
                b"t" if cell.as_ref().is_some_and(|c| c.kind == CellKind::InlineString) => {
                    in_value = true;
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"c" => {
                    next_column = attribute(e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column)
                        + 1;
                }
                b"row" => rows.push(Vec::new()),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_value {
                    if let Some(ref mut pending) = cell {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::XmlError(format!("Bad cell text: {}", e)))?;
                        pending.raw.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(pending), Some(row)) = (cell.take(), current_row.as_mut()) {
                        row.push((pending.column, cell_value(&pending, shared)));
                    }
                }
                b"row" => {
                    if let Some(row) = current_row.take() {
                        rows.push(row);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing worksheet: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rows)
}

fn cell_value(cell: &PendingCell, shared: &[String]) -> CellValue {
    let raw = cell.raw.as_str();
    match cell.kind {
        CellKind::SharedString => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or(CellValue::Empty),
        CellKind::InlineString | CellKind::FormulaString | CellKind::Error => {
            CellValue::Text(raw.to_string())
        }
        CellKind::Bool => CellValue::Bool(raw.trim() == "1"),
        CellKind::Number if raw.trim().is_empty() => CellValue::Empty,
        CellKind::Number => raw
            .trim()
            .parse::<f64>()
            .map(CellValue::Number)
            .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
    }
}

/// First non-blank row becomes the header; blank data rows are dropped.
fn build_sheet(name: String, grid: Vec<Vec<(usize, CellValue)>>) -> Sheet {
    let mut sheet = Sheet::new(name);
    let mut rows = grid
        .into_iter()
        .filter(|cells| cells.iter().any(|(_, v)| !v.is_empty()));

    let Some(header_cells) = rows.next() else {
        return sheet;
    };

    let width = header_cells.iter().map(|(c, _)| c + 1).max().unwrap_or(0);
    let mut headers: Vec<String> = (0..width).map(|i| format!("Unnamed: {}", i)).collect();
    for (column, value) in header_cells {
        if !value.is_empty() {
            headers[column] = value.to_string();
        }
    }

    for cells in rows {
        let mut values = vec![CellValue::Empty; headers.len()];
        for (column, value) in cells {
            match values.get_mut(column) {
                Some(slot) => *slot = value,
                None => log::debug!(
                    "Sheet '{}': ignoring value in column {} without a header",
                    sheet.name,
                    column + 1
                ),
            }
        }
        sheet
            .rows
            .push(Row::from_pairs(headers.iter().cloned().zip(values)));
    }

    sheet.headers = headers;
    sheet
}

/// 0-based column index from a cell reference like `"AB12"`.
///
/// References past the last worksheet column (`XFD`) give `None`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }

    let mut index = 0usize;
    for b in letters {
        index = index
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize)?;
        if index > MAX_COLUMNS {
            return None;
        }
    }
    Some(index - 1)
}

/// Archive path for a relationship target inside `xl/`.
fn part_path(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{}", target)
    }
}
