//! Tab-delimited record files with a header row.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{Record, RecordSource};
use crate::error::{Result, SchemaError};

/// Reads tab-delimited text. Quoting is disabled and rows may be ragged.
/// Each cell is split on a list delimiter into multiple values.
pub struct TabbedRecords<R: Read> {
    name: String,
    columns: Vec<String>,
    list_delimiter: String,
    rows: csv::StringRecordsIntoIter<R>,
}

impl TabbedRecords<File> {
    /// Open a tab-delimited file.
    pub fn open(path: &Path, list_delimiter: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| SchemaError::io(path.display().to_string(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_reader(name, file, list_delimiter)
    }
}

impl<R: Read> TabbedRecords<R> {
    /// Read tab-delimited text from any reader.
    pub fn from_reader(name: impl Into<String>, reader: R, list_delimiter: &str) -> Result<Self> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);
        let columns = reader
            .headers()
            .map_err(|e| SchemaError::record(&name, e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self {
            name,
            columns,
            list_delimiter: list_delimiter.to_string(),
            rows: reader.into_records(),
        })
    }

    fn split_cell(&self, cell: &str) -> Vec<String> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Vec::new();
        }
        if self.list_delimiter.is_empty() {
            return vec![cell.to_string()];
        }
        cell.split(self.list_delimiter.as_str())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect()
    }
}

impl<R: Read> RecordSource for TabbedRecords<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_record(&mut self) -> Option<Result<Record>> {
        let row = self.rows.next()?;
        Some(
            row.map(|row| Record::new(row.iter().map(|cell| self.split_cell(cell)).collect()))
                .map_err(|e| SchemaError::record(&self.name, e.to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FEATURES: &str = "patric_id\tgenome_id\tgo\n\
                            f1\tg1\tGO:1::GO:2\n\
                            f2\tg1\t\n\
                            f3\n";

    #[test]
    fn test_reads_header_and_rows() {
        let mut records = TabbedRecords::from_reader("feature.tbl", FEATURES.as_bytes(), "::").unwrap();
        assert_eq!(records.columns(), &["patric_id", "genome_id", "go"]);

        let first = records.next_record().unwrap().unwrap();
        assert_eq!(first.get(0), "f1");
        assert_eq!(first.get_all(2), &["GO:1".to_string(), "GO:2".to_string()]);

        let second = records.next_record().unwrap().unwrap();
        assert!(second.get_all(2).is_empty());

        // Ragged row: missing trailing cells read as blank.
        let third = records.next_record().unwrap().unwrap();
        assert_eq!(third.get(0), "f3");
        assert_eq!(third.get(1), "");

        assert!(records.next_record().is_none());
    }

    #[test]
    fn test_empty_delimiter_keeps_cell_whole() {
        let mut records = TabbedRecords::from_reader("feature.tbl", FEATURES.as_bytes(), "").unwrap();
        let first = records.next_record().unwrap().unwrap();
        assert_eq!(first.get_all(2), &["GO:1::GO:2".to_string()]);
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.tbl");
        let mut file = File::create(&path).unwrap();
        write!(file, "genome_id\tgenome_name\ng1\tE. coli\n").unwrap();

        let mut records = TabbedRecords::open(&path, "::").unwrap();
        assert_eq!(records.name(), "genome.tbl");
        assert_eq!(records.require_column("genome_name").unwrap(), 1);
        let record = records.next_record().unwrap().unwrap();
        assert_eq!(record.get(1), "E. coli");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TabbedRecords::open(&dir.path().join("absent.tbl"), "::");
        assert!(matches!(result, Err(SchemaError::Io { .. })));
    }
}
