//! XLSX workbook reading.
//!
//! Reads every worksheet of an Office Open XML workbook into [`Sheet`]s.
//! The first non-blank row of a sheet names the columns.

pub mod reader;

pub use reader::XlsxReader;

use present_core::{Result, Sheet};
use std::path::Path;

/// Read all sheets of the workbook at `path`, in workbook order.
pub fn read_workbook(path: &Path) -> Result<Vec<Sheet>> {
    XlsxReader::new().open(path)
}
