//! Reading and writing `.xlsx` sheets as plain [`Table`]s.
//!
//! Reading goes through `calamine`, writing through `rust_xlsxwriter`. The
//! workbook is rendered into memory first, written to a temporary file next
//! to the target and then renamed over it, so a failed write never leaves
//! half a workbook on disk.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Trimmed text form of the cell. Whole numbers print without a
    /// fractional part so a filename column holding `1` reads as `"1"`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Blank => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    /// Blank cells and whitespace-only text count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Blank,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A sheet: one header row followed by data rows. Rows may be shorter than
/// the header; missing trailing cells are blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// 1-based sheet line of `rows[0]`.
    pub first_line: usize,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            first_line: 2,
        }
    }

    /// Line number a user sees in a spreadsheet program for data row `row`.
    pub fn line_of(&self, row: usize) -> usize {
        self.first_line + row
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row`, `column`, blank when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        const BLANK: &Cell = &Cell::Blank;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(BLANK)
    }
}

#[derive(Debug)]
pub enum SheetError {
    /// The target file is open in another program or read-only.
    Locked { path: PathBuf },
    /// The workbook has no sheet with this name.
    MissingSheet { path: PathBuf, sheet: String },
    Read(calamine::Error),
    Write(rust_xlsxwriter::XlsxError),
    Io(std::io::Error),
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetError::Locked { path } => write!(
                f,
                "cannot write {}: the file is open in another program or read-only. Close it and run again",
                path.display()
            ),
            SheetError::MissingSheet { path, sheet } => {
                write!(f, "{} has no sheet named {sheet:?}", path.display())
            }
            SheetError::Read(e) => write!(f, "failed to read workbook: {e}"),
            SheetError::Write(e) => write!(f, "failed to build workbook: {e}"),
            SheetError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetError::Read(e) => Some(e),
            SheetError::Write(e) => Some(e),
            SheetError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for SheetError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        SheetError::Write(e)
    }
}

// Windows reports a file held open by Excel as a sharing or lock violation
// rather than as access denied.
#[cfg(windows)]
fn is_locked_os_error(code: Option<i32>) -> bool {
    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;
    matches!(code, Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION))
}

#[cfg(not(windows))]
fn is_locked_os_error(_code: Option<i32>) -> bool {
    false
}

/// Maps an I/O error on `path` to [`SheetError::Locked`] when the file is
/// held by another program or read-only.
pub fn classify(e: std::io::Error, path: &Path) -> SheetError {
    if e.kind() == ErrorKind::PermissionDenied || is_locked_os_error(e.raw_os_error()) {
        SheetError::Locked {
            path: path.to_owned(),
        }
    } else {
        SheetError::Io(e)
    }
}

/// Writes `contents` to a temporary file beside `path` and renames it into
/// place. Either the whole file lands or the old one is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// [`write_atomic`], reporting a locked target as [`SheetError::Locked`].
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), SheetError> {
    write_atomic(path, contents).map_err(|e| classify(e, path))
}

/// Deletes a previous run's output so it can't be mistaken for this run's.
/// Returns whether a file was removed.
pub fn remove_stale(path: &Path) -> Result<bool, SheetError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(classify(e, path)),
    }
}

/// Renders `table` as a single-sheet workbook.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, SheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Blank => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn write_table(table: &Table, path: &Path) -> Result<(), SheetError> {
    let bytes = to_xlsx(table)?;
    write_file(path, &bytes)?;
    debug!(
        "wrote {} rows x {} columns to {}",
        table.rows.len(),
        table.headers.len(),
        path.display()
    );
    Ok(())
}

/// Reads sheet `sheet` of the workbook at `path`. The first non-empty row is
/// taken as the header; header names are trimmed. Blank rows are kept so row
/// positions keep matching the sheet's line numbers.
pub fn read_table(path: &Path, sheet: &str) -> Result<Table, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(SheetError::Read)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(SheetError::MissingSheet {
            path: path.to_owned(),
            sheet: sheet.to_string(),
        });
    }
    let range = workbook.worksheet_range(sheet).map_err(SheetError::Read)?;

    let header_line = range.start().map_or(1, |(row, _)| row as usize + 1);
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header.iter().map(|c| Cell::from(c).as_text()).collect(),
        None => return Ok(Table::new(Vec::new())),
    };
    let rows = rows
        .map(|row| row.iter().map(Cell::from).collect::<Vec<_>>())
        .collect();

    Ok(Table {
        headers,
        rows,
        first_line: header_line + 1,
    })
}
