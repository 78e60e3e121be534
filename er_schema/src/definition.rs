//! Definition-file loader - builds the entity type registry.
//!
//! The definition file is line oriented:
//!
//! ```text
//! #Entity <name> <idCol> <priority> [<fileName>]
//! <attribute specification>...
//! #Relationship <sourceType> <sourceCol> <targetType> <targetCol> [<column>:<attribute>...]
//! <forward template>      (text-walk mode only)
//! <reverse template>      (text-walk mode only)
//! ```
//!
//! An id column of `null` declares a connector (join table), `generated`
//! declares a type whose ids are assigned per record. Blank lines are ignored.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, SchemaError};
use crate::template::Template;
use crate::types::{
    AttributeSpec, EntityType, FieldMapping, IdColumn, Mode, RelationshipPayload,
    RelationshipType,
};

/// The loaded type registry.
#[derive(Debug, Clone)]
pub struct Schema {
    mode: Mode,
    types: HashMap<String, EntityType>,
    /// Type names by descending priority, then name.
    ordered: Vec<String>,
}

impl Schema {
    /// Load a definition file from disk.
    pub fn load(path: &Path, mode: Mode) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::io(path.display().to_string(), e))?;
        Self::parse(&text, &path.display().to_string(), mode)
    }

    /// Parse definition text. `file` is only used in error messages.
    pub fn parse(text: &str, file: &str, mode: Mode) -> Result<Self> {
        let mut parser = Parser::new(file, mode);
        for (index, line) in text.lines().enumerate() {
            parser.line(index + 1, line)?;
        }
        let types = parser.finish()?;

        let mut ordered: Vec<String> = types.keys().cloned().collect();
        ordered.sort_by(|a, b| {
            let (pa, pb) = (types[a].priority, types[b].priority);
            pb.cmp(&pa).then_with(|| a.cmp(b))
        });

        info!(file, %mode, types = types.len(), "loaded entity definitions");
        Ok(Self {
            mode,
            types,
            ordered,
        })
    }

    /// The traversal mode the schema was parsed for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Look up an entity type by exact name.
    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Look up an entity type ignoring ASCII case.
    pub fn find_ignore_case(&self, name: &str) -> Option<&EntityType> {
        self.get(name).or_else(|| {
            self.types
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name))
        })
    }

    /// Type names by descending priority, then name.
    pub fn ordered_names(&self) -> &[String] {
        &self.ordered
    }

    /// Entity types by descending priority, then name.
    pub fn ordered_types(&self) -> impl Iterator<Item = &EntityType> {
        self.ordered.iter().filter_map(|name| self.types.get(name))
    }

    /// Number of entity types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no entity types were declared.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Every field name a Query-mode instance of `type_name` can carry.
    ///
    /// This is the declared attribute columns, the id column, and attributes
    /// mapped onto the type by connector relationships.
    pub fn known_fields(&self, type_name: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let Some(entity) = self.types.get(type_name) else {
            return fields;
        };
        if let Some(column) = entity.id_column.column() {
            fields.push(column.to_string());
        }
        fields.extend(entity.attribute_columns().map(String::from));
        for other in self.types.values() {
            for relationship in &other.relationships {
                if relationship.target_type == type_name {
                    fields.extend(relationship.field_map().iter().map(|m| m.attribute.clone()));
                }
            }
        }
        fields.sort();
        fields.dedup();
        fields
    }
}

/// A text-walk relationship header waiting for its two template lines.
struct PendingRelationship {
    relationship: RelationshipType,
    bodies: Vec<(usize, String)>,
}

struct Parser<'a> {
    file: &'a str,
    mode: Mode,
    types: HashMap<String, EntityType>,
    current: Option<EntityType>,
    pending: Option<PendingRelationship>,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str, mode: Mode) -> Self {
        Self {
            file,
            mode,
            types: HashMap::new(),
            current: None,
            pending: None,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> SchemaError {
        SchemaError::parse(self.file, line, message)
    }

    fn line(&mut self, number: usize, raw: &str) -> Result<()> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(());
        }

        if line.starts_with('#') {
            self.finish_relationship()?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            return match tokens[0] {
                "#Entity" => self.entity_header(number, &tokens),
                "#Relationship" => self.relationship_header(number, &tokens),
                other => Err(self.error(number, format!("unknown header \"{}\"", other))),
            };
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.bodies.push((number, line.to_string()));
            if pending.bodies.len() == 2 {
                self.finish_relationship()?;
            }
            return Ok(());
        }

        let Some(current) = self.current.as_mut() else {
            return Err(self.error(number, "attribute specification outside an entity section"));
        };
        if !current.relationships.is_empty() {
            let message = format!("attribute specification after a relationship in {}", current.name);
            return Err(self.error(number, message));
        }
        let spec = AttributeSpec::parse(self.mode, line)
            .map_err(|message| SchemaError::parse(self.file, number, message))?;
        current.attributes.push(spec);
        Ok(())
    }

    fn entity_header(&mut self, number: usize, tokens: &[&str]) -> Result<()> {
        self.finish_entity()?;
        if tokens.len() != 4 && tokens.len() != 5 {
            return Err(self.error(
                number,
                "expected \"#Entity <name> <idCol> <priority> [<fileName>]\"",
            ));
        }
        let priority: i32 = tokens[3]
            .parse()
            .map_err(|_| self.error(number, format!("bad priority \"{}\"", tokens[3])))?;

        let mut entity = EntityType::new(tokens[1], IdColumn::parse(tokens[2]), priority);
        entity.line = number;
        if let Some(file_name) = tokens.get(4) {
            entity.file_name = Some(file_name.to_string());
        }
        self.current = Some(entity);
        Ok(())
    }

    fn relationship_header(&mut self, number: usize, tokens: &[&str]) -> Result<()> {
        if self.current.is_none() {
            return Err(self.error(number, "relationship outside an entity section"));
        }
        let arity_ok = match self.mode {
            Mode::Query => tokens.len() >= 5,
            Mode::TextWalk => tokens.len() == 5,
        };
        if !arity_ok {
            return Err(self.error(
                number,
                "expected \"#Relationship <sourceType> <sourceCol> <targetType> <targetCol>\"",
            ));
        }

        let mut relationship = RelationshipType {
            source_type: tokens[1].to_string(),
            source_column: tokens[2].to_string(),
            target_type: tokens[3].to_string(),
            target_column: tokens[4].to_string(),
            payload: RelationshipPayload::Query {
                field_map: Vec::new(),
            },
            line: number,
        };

        match self.mode {
            Mode::Query => {
                let field_map = tokens[5..]
                    .iter()
                    .map(|token| match token.split_once(':') {
                        Some((column, attribute)) if !column.is_empty() && !attribute.is_empty() => {
                            Ok(FieldMapping {
                                column: column.to_string(),
                                attribute: attribute.to_string(),
                            })
                        }
                        _ => Err(self.error(
                            number,
                            format!("bad field mapping \"{}\", expected <column>:<attribute>", token),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                relationship.payload = RelationshipPayload::Query { field_map };
                self.push_relationship(relationship);
            }
            Mode::TextWalk => {
                self.pending = Some(PendingRelationship {
                    relationship,
                    bodies: Vec::new(),
                });
            }
        }
        Ok(())
    }

    fn push_relationship(&mut self, relationship: RelationshipType) {
        if let Some(current) = self.current.as_mut() {
            current.relationships.push(relationship);
        }
    }

    fn finish_relationship(&mut self) -> Result<()> {
        let Some(PendingRelationship {
            mut relationship,
            bodies,
        }) = self.pending.take()
        else {
            return Ok(());
        };
        if bodies.len() < 2 {
            return Err(self.error(
                relationship.line,
                "relationship needs a forward and a reverse template line",
            ));
        }
        let template = |(number, text): &(usize, String)| {
            Template::parse(text).map_err(|e| SchemaError::parse(self.file, *number, e.to_string()))
        };
        relationship.payload = RelationshipPayload::TextWalk {
            forward: template(&bodies[0])?,
            reverse: template(&bodies[1])?,
        };
        self.push_relationship(relationship);
        Ok(())
    }

    fn finish_entity(&mut self) -> Result<()> {
        let Some(entity) = self.current.take() else {
            return Ok(());
        };
        if self.types.contains_key(&entity.name) {
            return Err(self.error(
                entity.line,
                format!("duplicate entity type \"{}\"", entity.name),
            ));
        }
        debug!(
            entity = %entity.name,
            attributes = entity.attributes.len(),
            relationships = entity.relationships.len(),
            "parsed entity section"
        );
        self.types.insert(entity.name.clone(), entity);
        Ok(())
    }

    fn finish(mut self) -> Result<HashMap<String, EntityType>> {
        self.finish_relationship()?;
        self.finish_entity()?;
        self.validate()?;
        Ok(self.types)
    }

    fn validate(&self) -> Result<()> {
        for entity in self.types.values() {
            for relationship in &entity.relationships {
                for endpoint in [&relationship.source_type, &relationship.target_type] {
                    match self.types.get(endpoint) {
                        None => {
                            return Err(self.error(
                                relationship.line,
                                format!("unknown entity type \"{}\"", endpoint),
                            ))
                        }
                        Some(target) if target.is_connector() => {
                            return Err(self.error(
                                relationship.line,
                                format!(
                                    "connector type \"{}\" cannot be a relationship endpoint",
                                    endpoint
                                ),
                            ))
                        }
                        Some(_) => {}
                    }
                }
                if !relationship.field_map().is_empty() && !entity.is_connector() {
                    return Err(self.error(
                        relationship.line,
                        "field mappings are only allowed in connector sections",
                    ));
                }
            }
        }
        Ok(())
    }
}
