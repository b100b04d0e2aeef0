//! CSV ingest and typing.
//!
//! This module turns a header-less CSV file into typed columns following a
//! [`DataSchema`]. It knows nothing about labels, bias or models.
//!
//! Design goals:
//! - **Strict schema** for column count and numeric parsing (exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)

use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::warn;

use crate::data::schema::{ColumnKind, DataSchema};
use crate::error::AppError;

/// One typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum RawColumn {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl RawColumn {
    pub fn len(&self) -> usize {
        match self {
            RawColumn::Numeric(v) => v.len(),
            RawColumn::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Typed columns in schema order plus ingest bookkeeping.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl RawTable {
    pub fn n_rows(&self) -> usize {
        self.rows_used
    }
}

/// Read `path` according to `schema`, skipping the first `skip_rows` records.
pub fn read_table(path: &Path, schema: &DataSchema, skip_rows: usize) -> Result<RawTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut columns: Vec<RawColumn> = schema
        .columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Numeric => RawColumn::Numeric(Vec::new()),
            ColumnKind::Categorical => RawColumn::Categorical(Vec::new()),
        })
        .collect();

    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;

    for (idx, result) in reader.records().enumerate() {
        if idx < skip_rows {
            continue;
        }
        let line = idx + 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows_read += 1;
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if is_blank(&record) {
            continue;
        }
        rows_read += 1;

        match parse_row(&record, schema) {
            Ok(values) => {
                for (col, value) in columns.iter_mut().zip(values) {
                    match (col, value) {
                        (RawColumn::Numeric(v), Cell::Numeric(x)) => v.push(x),
                        (RawColumn::Categorical(v), Cell::Categorical(s)) => v.push(s),
                        _ => {
                            return Err(AppError::new(
                                4,
                                format!("Column type mismatch at line {line} of '{}'.", path.display()),
                            ));
                        }
                    }
                }
                rows_used += 1;
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        let first = &row_errors[0];
        warn!(
            path = %path.display(),
            skipped = row_errors.len(),
            "Skipped malformed rows (first at line {}: {})",
            first.line,
            first.message
        );
    }

    if rows_used == 0 {
        return Err(AppError::new(
            2,
            format!("No valid rows in '{}'.", path.display()),
        ));
    }

    Ok(RawTable {
        columns,
        row_errors,
        rows_read,
        rows_used,
    })
}

enum Cell {
    Numeric(f64),
    Categorical(String),
}

fn parse_row(record: &StringRecord, schema: &DataSchema) -> Result<Vec<Cell>, String> {
    if record.len() != schema.columns.len() {
        return Err(format!(
            "Expected {} fields, found {}.",
            schema.columns.len(),
            record.len()
        ));
    }

    schema
        .columns
        .iter()
        .zip(record.iter())
        .map(|(spec, raw)| {
            let raw = match &spec.strip_suffix {
                Some(suffix) => raw.strip_suffix(suffix.as_str()).unwrap_or(raw),
                None => raw,
            };
            match spec.kind {
                ColumnKind::Numeric => parse_f64(raw)
                    .map(Cell::Numeric)
                    .ok_or_else(|| format!("Invalid numeric value '{raw}' in column `{}`.", spec.name)),
                ColumnKind::Categorical => Ok(Cell::Categorical(raw.to_string())),
            }
        })
        .collect()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

fn parse_f64(s: &str) -> Option<f64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
