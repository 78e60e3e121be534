//! Entity and relationship type descriptors.
//!
//! Types are built once by the definition loader and never change afterwards.
//! Everything that differs between the two traversal modes is carried in a
//! closed enum ([`AttributeSpec`], [`RelationshipPayload`]) chosen by [`Mode`].

use serde::{Deserialize, Serialize};

use crate::template::Template;

/// Sentinel id of connector instances.
pub const CONNECTOR_ID: &str = "<connector>";

/// How a loaded graph is going to be traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Attributes capture raw field values for question proposals.
    Query,
    /// Attributes and crossings render sentences for random walks.
    TextWalk,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Query => write!(f, "query"),
            Mode::TextWalk => write!(f, "text-walk"),
        }
    }
}

/// How an entity type identifies its instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdColumn {
    /// The id is read from a named column.
    Column(String),
    /// A join table with no id of its own. Its records only relay crossings.
    Connector,
    /// Every record receives a fresh id from a per-type counter.
    Generated,
}

impl IdColumn {
    /// Interpret the id-column token of an `#Entity` header.
    pub fn parse(token: &str) -> Self {
        match token {
            "null" => IdColumn::Connector,
            "generated" => IdColumn::Generated,
            column => IdColumn::Column(column.to_string()),
        }
    }

    /// The column name, if the id comes from a column.
    pub fn column(&self) -> Option<&str> {
        match self {
            IdColumn::Column(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// One attribute line of an entity section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSpec {
    /// Query mode: capture the values of a column under its own name.
    Column(String),
    /// Text-walk mode: render a sentence from the record.
    Sentence(Template),
}

impl AttributeSpec {
    /// Parse an attribute line for the given mode.
    pub fn parse(mode: Mode, line: &str) -> Result<Self, String> {
        match mode {
            Mode::Query => {
                let mut tokens = line.split_whitespace();
                match (tokens.next(), tokens.next()) {
                    (Some(column), None) => Ok(AttributeSpec::Column(column.to_string())),
                    _ => Err(format!("expected a single column name, found \"{}\"", line)),
                }
            }
            Mode::TextWalk => Template::parse(line)
                .map(AttributeSpec::Sentence)
                .map_err(|e| e.to_string()),
        }
    }
}

/// A join-table column captured onto the target of a connector crossing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldMapping {
    pub column: String,
    pub attribute: String,
}

/// Mode-specific part of a relationship type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipPayload {
    /// Query mode. Mappings are only allowed in connector sections.
    Query { field_map: Vec<FieldMapping> },
    /// Text-walk mode: one sentence per crossing direction.
    TextWalk { forward: Template, reverse: Template },
}

/// A declared relationship between two entity types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipType {
    pub source_type: String,
    pub source_column: String,
    pub target_type: String,
    pub target_column: String,
    pub payload: RelationshipPayload,
    /// Definition-file line of the `#Relationship` header.
    pub line: usize,
}

impl RelationshipType {
    /// Field mappings of a Query-mode relationship (empty otherwise).
    pub fn field_map(&self) -> &[FieldMapping] {
        match &self.payload {
            RelationshipPayload::Query { field_map } => field_map.as_slice(),
            RelationshipPayload::TextWalk { .. } => &[],
        }
    }
}

/// A declared kind of node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub name: String,
    pub id_column: IdColumn,
    /// Higher priorities are scanned and walked first.
    pub priority: i32,
    /// Input file name. Types without one are only reached through relationships.
    pub file_name: Option<String>,
    pub attributes: Vec<AttributeSpec>,
    pub relationships: Vec<RelationshipType>,
    /// Definition-file line of the `#Entity` header.
    pub line: usize,
}

impl EntityType {
    /// Create an entity type with no attributes or relationships.
    pub fn new(name: impl Into<String>, id_column: IdColumn, priority: i32) -> Self {
        Self {
            name: name.into(),
            id_column,
            priority,
            file_name: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
            line: 0,
        }
    }

    /// Set the input file name.
    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Add an attribute specification.
    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an outgoing relationship.
    pub fn with_relationship(mut self, relationship: RelationshipType) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Whether this type is a connector (join table).
    pub fn is_connector(&self) -> bool {
        self.id_column == IdColumn::Connector
    }

    /// Names of the Query-mode attribute columns.
    pub fn attribute_columns(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().filter_map(|a| match a {
            AttributeSpec::Column(column) => Some(column.as_str()),
            AttributeSpec::Sentence(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_column_keywords() {
        assert_eq!(IdColumn::parse("null"), IdColumn::Connector);
        assert_eq!(IdColumn::parse("generated"), IdColumn::Generated);
        assert_eq!(
            IdColumn::parse("genome_id"),
            IdColumn::Column("genome_id".to_string())
        );
        assert_eq!(IdColumn::parse("genome_id").column(), Some("genome_id"));
        assert_eq!(IdColumn::Connector.column(), None);
    }

    #[test]
    fn test_attribute_spec_query_mode() {
        let spec = AttributeSpec::parse(Mode::Query, "genome_name").unwrap();
        assert_eq!(spec, AttributeSpec::Column("genome_name".to_string()));
        assert!(AttributeSpec::parse(Mode::Query, "genome name").is_err());
    }

    #[test]
    fn test_attribute_spec_text_mode() {
        let spec = AttributeSpec::parse(Mode::TextWalk, "Genome {{genome_id}} is {{genome_name}}.").unwrap();
        assert!(matches!(spec, AttributeSpec::Sentence(ref t) if t.fields().count() == 2));
        assert!(AttributeSpec::parse(Mode::TextWalk, "Genome {{genome_id").is_err());
    }

    #[test]
    fn test_entity_type_builder() {
        let genome = EntityType::new("Genome", IdColumn::parse("genome_id"), 10)
            .with_file("genome.tbl")
            .with_attribute(AttributeSpec::Column("genome_name".to_string()))
            .with_attribute(AttributeSpec::Column("contigs".to_string()));

        assert!(!genome.is_connector());
        assert_eq!(genome.file_name.as_deref(), Some("genome.tbl"));
        let columns: Vec<_> = genome.attribute_columns().collect();
        assert_eq!(columns, vec!["genome_name", "contigs"]);

        let join = EntityType::new("FeatureSubsystem", IdColumn::Connector, 0);
        assert!(join.is_connector());
    }
}
