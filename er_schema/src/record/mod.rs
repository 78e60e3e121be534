//! Record sources - named-field records read one file at a time.
//!
//! Every source exposes its column names up front so that loaders can resolve
//! column indices once per file, then hands out [`Record`]s whose values are
//! addressed by index. A cell may hold several values (a delimited list in a
//! tab file, an array in a JSON file).

mod json;
mod tabbed;

pub use json::*;
pub use tabbed::*;

use std::path::Path;

use crate::error::{Result, SchemaError};

/// One input record: a value list per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: Vec<Vec<String>>,
}

impl Record {
    /// Create a record from per-column value lists.
    pub fn new(values: Vec<Vec<String>>) -> Self {
        Self { values }
    }

    /// First value of a column, or `""` when the column is empty or absent.
    pub fn get(&self, index: usize) -> &str {
        self.values
            .get(index)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// All values of a column.
    pub fn get_all(&self, index: usize) -> &[String] {
        self.values.get(index).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// First value of a column parsed as an integer.
    pub fn get_int(&self, index: usize) -> Option<i64> {
        self.get(index).trim().parse().ok()
    }

    /// Number of columns in this record.
    pub fn width(&self) -> usize {
        self.values.len()
    }
}

/// A file of named-field records.
pub trait RecordSource {
    /// Name used in error messages, usually the file name.
    fn name(&self) -> &str;

    /// Column names in file order.
    fn columns(&self) -> &[String];

    /// Read the next record, or `None` at end of input.
    fn next_record(&mut self) -> Option<Result<Record>>;

    /// Find a column index by name.
    ///
    /// An exact match wins. Otherwise the part after the last `.` is compared,
    /// so `genome.genome_name` finds a `genome_name` column and vice versa.
    /// A suffix shared by more than one column matches nothing.
    fn find_column(&self, name: &str) -> Option<usize> {
        let columns = self.columns();
        if let Some(index) = columns.iter().position(|c| c == name) {
            return Some(index);
        }
        let short = short_name(name);
        let mut matches = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| short_name(c) == short)
            .map(|(index, _)| index);
        match (matches.next(), matches.next()) {
            (Some(index), None) => Some(index),
            _ => None,
        }
    }

    /// Find a column index by name, failing when it is absent.
    fn require_column(&self, name: &str) -> Result<usize> {
        self.find_column(name)
            .ok_or_else(|| SchemaError::MissingColumn {
                file: self.name().to_string(),
                column: name.to_string(),
            })
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Open an input file, choosing the reader by extension.
///
/// `.json` files are read as a JSON array of objects, anything else as
/// tab-delimited text with a header row.
pub fn open_records(path: &Path, list_delimiter: &str) -> Result<Box<dyn RecordSource>> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        Ok(Box::new(JsonRecords::open(path)?))
    } else {
        Ok(Box::new(TabbedRecords::open(path, list_delimiter)?))
    }
}

/// An in-memory record source.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecords {
    name: String,
    columns: Vec<String>,
    rows: std::collections::VecDeque<Record>,
}

impl MemoryRecords {
    /// Create a source from column names and per-row value lists.
    pub fn new(name: impl Into<String>, columns: &[&str], rows: Vec<Vec<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(Record::new).collect(),
        }
    }

    /// Create a source where every cell holds at most one value.
    ///
    /// Empty strings become empty cells.
    pub fn from_rows(name: impl Into<String>, columns: &[&str], rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            Vec::new()
                        } else {
                            vec![cell.to_string()]
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(name, columns, rows)
    }
}

impl RecordSource for MemoryRecords {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Option<Result<Record>> {
        self.rows.pop_front().map(Ok)
    }
}
