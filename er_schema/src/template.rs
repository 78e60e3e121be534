//! Template definitions - `{{field}}` substitution over input records.
//!
//! A [`Template`] is parsed once when the definition file is loaded. Before a
//! file is read it is bound against that file's columns, which resolves every
//! placeholder to a column index and fails fast on unknown columns.

use crate::error::{Result, SchemaError};
use crate::record::{Record, RecordSource};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(String),
}

/// A parsed free-text template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Placeholders are written `{{name}}` or `{{prefix.name}}`. Unclosed,
    /// stray or empty placeholders are rejected.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| SchemaError::Template {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let text = &rest[..open];
            if text.contains("}}") {
                return Err(invalid("\"}}\" without matching \"{{\""));
            }
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }

            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| invalid("unclosed placeholder"))?;
            let field = after[..close].trim();
            if field.is_empty() {
                return Err(invalid("empty placeholder"));
            }
            if field.contains("{{") {
                return Err(invalid("nested placeholder"));
            }
            segments.push(Segment::Field(field.to_string()));
            rest = &after[close + 2..];
        }

        if rest.contains("}}") {
            return Err(invalid("\"}}\" without matching \"{{\""));
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render by substituting each placeholder with `lookup(field)`.
    ///
    /// Runs of spaces left by empty substitutions collapse to one.
    pub fn render_with<F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&lookup(name)),
            }
        }
        out.split(' ')
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resolve every placeholder against the columns of a record source.
    pub fn bind(&self, records: &dyn RecordSource) -> Result<BoundTemplate> {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => Ok(BoundSegment::Text(text.clone())),
                Segment::Field(name) => records.require_column(name).map(BoundSegment::Column),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundTemplate { segments })
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[derive(Debug, Clone)]
enum BoundSegment {
    Text(String),
    Column(usize),
}

/// A template whose placeholders have been resolved to column indices.
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    segments: Vec<BoundSegment>,
}

impl BoundTemplate {
    /// Render against one record.
    ///
    /// Multi-valued fields are joined with `", "`. If any placeholder has no
    /// value the whole rendering is blank.
    pub fn render(&self, record: &Record) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                BoundSegment::Text(text) => out.push_str(text),
                BoundSegment::Column(index) => {
                    let values: Vec<&str> = record
                        .get_all(*index)
                        .iter()
                        .map(|v| v.trim())
                        .filter(|v| !v.is_empty())
                        .collect();
                    if values.is_empty() {
                        return String::new();
                    }
                    out.push_str(&values.join(", "));
                }
            }
        }
        out.trim().to_string()
    }
}
