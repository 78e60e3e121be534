//! JSON record files: a top-level array of flat objects.

use std::collections::VecDeque;
use std::path::Path;

use serde_json::Value;

use super::{Record, RecordSource};
use crate::error::{Result, SchemaError};

/// Reads a JSON array of objects.
///
/// Columns are the union of the object keys. Arrays become
/// multi-valued cells and `null` becomes an empty cell.
#[derive(Debug)]
pub struct JsonRecords {
    name: String,
    columns: Vec<String>,
    rows: VecDeque<Record>,
}

impl JsonRecords {
    /// Open and parse a JSON dump file.
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::io(path.display().to_string(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(name, &text)
    }

    /// Parse JSON text.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let value: Value =
            serde_json::from_str(text).map_err(|e| SchemaError::record(&name, e.to_string()))?;
        let Value::Array(items) = value else {
            return Err(SchemaError::record(&name, "expected a top-level array"));
        };

        let mut columns: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let Value::Object(object) = item else {
                return Err(SchemaError::record(
                    &name,
                    format!("element {} is not an object", position),
                ));
            };
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
            objects.push(object);
        }

        let rows = objects
            .into_iter()
            .map(|object| {
                Record::new(
                    columns
                        .iter()
                        .map(|column| object.get(column).map(cell_values).unwrap_or_default())
                        .collect(),
                )
            })
            .collect();

        Ok(Self {
            name,
            columns,
            rows,
        })
    }
}

fn cell_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(cell_values).collect(),
        Value::Object(_) => vec![value.to_string()],
    }
}

impl RecordSource for JsonRecords {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_objects() {
        let text = r#"[
            {"genome_id": "g1", "genome_name": "E. coli", "contigs": 3},
            {"genome_id": "g2", "reference": true, "taxon_lineage": ["Bacteria", "Proteobacteria"]},
            {"genome_id": null}
        ]"#;
        let mut records = JsonRecords::parse("genome.json", text).unwrap();
        assert_eq!(records.columns().len(), 5);

        let contigs = records.require_column("contigs").unwrap();
        let lineage = records.require_column("taxon_lineage").unwrap();
        let reference = records.require_column("reference").unwrap();
        let id = records.require_column("genome_id").unwrap();

        let first = records.next_record().unwrap().unwrap();
        assert_eq!(first.get(id), "g1");
        assert_eq!(first.get_int(contigs), Some(3));
        assert!(first.get_all(lineage).is_empty());

        let second = records.next_record().unwrap().unwrap();
        assert_eq!(second.get_all(lineage).len(), 2);
        assert_eq!(second.get(reference), "true");

        let third = records.next_record().unwrap().unwrap();
        assert_eq!(third.get(id), "");
        assert!(records.next_record().is_none());
    }

    #[test]
    fn test_rejects_non_array() {
        let result = JsonRecords::parse("bad.json", r#"{"genome_id": "g1"}"#);
        assert!(matches!(result, Err(SchemaError::Record { .. })));
    }

    #[test]
    fn test_rejects_non_object_element() {
        let result = JsonRecords::parse("bad.json", r#"[1, 2]"#);
        assert!(result.is_err());
    }
}
