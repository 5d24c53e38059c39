//! Attendance table persisted as an `.xlsx` workbook.
//!
//! Every append reads the whole table, adds one row and writes the whole table
//! back. The rewrite goes to a sibling `tempfile` that is then persisted over
//! the target, so an interrupted write leaves the previous table intact and a
//! failed one leaves no staging file behind. There is no locking, so two
//! processes appending to the same file can lose rows.

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column headers, in order.
pub const COLUMNS: [&str; 5] = ["Roll Number", "Name", "Date", "Time", "Day"];

/// Identifier written for a recognised name that has no roster entry.
pub const MISSING_IDENTIFIER: &str = "N/A";

const SHEET_NAME: &str = "Attendance";

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("failed to read attendance table {path}: {source}")]
    Read {
        path: PathBuf,
        source: calamine::XlsxError,
    },
    #[error("attendance table {0} has no worksheet")]
    NoWorksheet(PathBuf),
    #[error("failed to write attendance table {path}: {source}")]
    Write {
        path: PathBuf,
        source: rust_xlsxwriter::XlsxError,
    },
    #[error("failed to replace attendance table {path}: {source}")]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One attendance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub identifier: String,
    pub name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    /// Full weekday name, e.g. `Monday`.
    pub day: String,
}

impl AttendanceRecord {
    /// Stamp a sighting of `name` at `at`.
    pub fn stamped(identifier: &str, name: &str, at: NaiveDateTime) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            day: at.format("%A").to_string(),
        }
    }

    fn fields(&self) -> [&str; 5] {
        [&self.identifier, &self.name, &self.date, &self.time, &self.day]
    }

    fn from_row(row: &[Data]) -> Self {
        let cell = |i: usize| row.get(i).map(cell_text).unwrap_or_default();
        Self {
            identifier: cell(0),
            name: cell(1),
            date: cell(2),
            time: cell(3),
            day: cell(4),
        }
    }
}

/// Render a cell as text. Whole numbers lose their `.0` so numeric roll
/// numbers written by other tools read back as `101`, not `101.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Handle on the attendance workbook at `path`.
#[derive(Debug, Clone)]
pub struct AttendanceLog {
    path: PathBuf,
}

impl AttendanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every row in the table, header excluded. A missing file is an empty table.
    pub fn read_all(&self) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let read_err = |source| AttendanceError::Read {
            path: self.path.clone(),
            source,
        };
        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(read_err)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AttendanceError::NoWorksheet(self.path.clone()))?
            .map_err(|source| AttendanceError::Read {
                path: self.path.clone(),
                source,
            })?;

        Ok(range
            .rows()
            .skip(1)
            .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
            .map(AttendanceRecord::from_row)
            .collect())
    }

    /// Append `record`: read the table, add the row, write the table back.
    pub fn append(&self, record: &AttendanceRecord) -> Result<(), AttendanceError> {
        let mut records = self.read_all()?;
        records.push(record.clone());
        self.write_all(&records)?;
        tracing::debug!(
            path = %self.path.display(),
            rows = records.len(),
            "attendance table rewritten"
        );
        Ok(())
    }

    fn write_all(&self, records: &[AttendanceRecord]) -> Result<(), AttendanceError> {
        let write_err = |source| AttendanceError::Write {
            path: self.path.clone(),
            source,
        };

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME).map_err(write_err)?;

        let header = Format::new().set_bold();
        for (col, title) in COLUMNS.iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, *title, &header)
                .map_err(write_err)?;
            sheet.set_column_width(col as u16, 14).map_err(write_err)?;
        }
        for (row, record) in records.iter().enumerate() {
            for (col, value) in record.fields().iter().enumerate() {
                sheet
                    .write_string(row as u32 + 1, col as u16, *value)
                    .map_err(write_err)?;
            }
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let replace_err = |source| AttendanceError::Replace {
            path: self.path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(replace_err)?;

        // Dropped, and so deleted, on every early return below.
        let staging = tempfile::Builder::new()
            .prefix(&self.staging_prefix())
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(replace_err)?;
        workbook.save(staging.path()).map_err(write_err)?;
        staging
            .persist(&self.path)
            .map_err(|e| replace_err(e.error))?;
        Ok(())
    }

    /// `attendance.xlsx` stages as `.attendance.xlsx.XXXXXX.tmp` next to it, so
    /// the final rename never crosses a filesystem.
    fn staging_prefix(&self) -> String {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attendance.xlsx".to_string());
        format!(".{file_name}.")
    }
}
