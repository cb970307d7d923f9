//! Domain types for workbook rows, media references and rendered output.

use std::fmt;
use std::path::PathBuf;

/// A single cell value as read from the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No value.
    Empty,
    /// Text (shared, inline or formula string).
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

impl CellValue {
    /// Whether this cell carries no content.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Integral numbers print without a fractional part.
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
        }
    }
}

/// One data row: header-named fields in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, CellValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(name, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a field by header name (first match wins).
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Field value as text; missing fields are the empty string.
    pub fn text(&self, name: &str) -> String {
        self.get(name).map(|v| v.to_string()).unwrap_or_default()
    }

    /// Whether every field is empty.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_empty())
    }

    /// Iterate over fields in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A named sheet of data rows.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    /// Sheet name as shown in the workbook.
    pub name: String,

    /// Header names, in column order.
    pub headers: Vec<String>,

    /// Data rows, in source order.
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Create an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// A media reference from a row: remote locator or local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaReference<'a> {
    /// No reference given.
    Empty,
    /// `http://` or `https://` locator.
    Remote(&'a str),
    /// Filesystem path, relative to the base directory unless absolute.
    Local(&'a str),
}

/// Scheme prefixes that mark a reference as remote (exact, case-sensitive).
pub const REMOTE_SCHEMES: &[&str] = &["http://", "https://"];

impl<'a> MediaReference<'a> {
    /// Classify a reference string by scheme prefix only.
    pub fn classify(reference: &'a str) -> Self {
        if reference.is_empty() {
            MediaReference::Empty
        } else if REMOTE_SCHEMES.iter().any(|s| reference.starts_with(s)) {
            MediaReference::Remote(reference)
        } else {
            MediaReference::Local(reference)
        }
    }
}

/// A rendered page image for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Sheet the row belongs to.
    pub sheet: String,

    /// 0-based row index within the sheet.
    pub row_index: usize,

    /// Path of the rendered image.
    pub path: PathBuf,
}

/// What ended up in a written deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckSummary {
    /// Where the deck was written.
    pub path: PathBuf,

    /// Total number of slides, header and footer included.
    pub slide_count: usize,

    /// Number of content slides (one per artifact).
    pub content_slides: usize,

    /// Number of decorative pictures placed on the header slide.
    pub header_pictures: usize,
}
