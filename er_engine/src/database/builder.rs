//! Record-to-graph builder.
//!
//! An [`EntityBuilder`] is bound once per (entity type, input file). Binding
//! resolves every declared column to an index and fails fast if one is
//! missing. After that each record is turned into instances and crossings.

use std::collections::HashMap;
use std::path::Path;

use er_schema::{
    open_records, AttributeSpec, BoundTemplate, EntityType, IdColumn, Record, RecordSource,
    RelationshipPayload, RelationshipType, Schema, CONNECTOR_ID,
};
use serde::Serialize;
use tracing::{debug, info, trace};

use super::{CrossingPayload, Database, InstanceKey};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Usage statistics for one captured attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    /// Records that carried the attribute's column.
    pub records: usize,
    /// Non-blank values captured.
    pub values: usize,
    /// Captured values that parse as numbers.
    pub numeric: usize,
    /// Captured values that read as booleans.
    pub boolean: usize,
}

/// Counters threaded through every builder call.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub files: usize,
    pub records: usize,
    pub crossings: usize,
    generated: HashMap<String, u64>,
    field_stats: HashMap<(String, String), FieldStats>,
}

impl BuildContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next generated id for a type: `<Type>:<n>`, counting from 1.
    pub fn next_generated_id(&mut self, entity_type: &str) -> String {
        let counter = self.generated.entry(entity_type.to_string()).or_default();
        *counter += 1;
        format!("{}:{}", entity_type, counter)
    }

    /// Statistics for one attribute of one type.
    pub fn field_stats(&self, entity_type: &str, attribute: &str) -> Option<&FieldStats> {
        self.field_stats
            .get(&(entity_type.to_string(), attribute.to_string()))
    }

    fn record_field(&mut self, entity_type: &str, attribute: &str, values: &[&str]) {
        let stats = self
            .field_stats
            .entry((entity_type.to_string(), attribute.to_string()))
            .or_default();
        stats.records += 1;
        stats.values += values.len();
        stats.numeric += values.iter().filter(|v| v.parse::<f64>().is_ok()).count();
        stats.boolean += values.iter().filter(|v| parse_bool(v).is_some()).count();
    }
}

/// Interpret a captured value as a boolean.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

enum BoundId {
    Column(usize),
    Connector,
    Generated,
}

enum BoundAttribute {
    Column { name: String, index: usize },
    Sentence(BoundTemplate),
}

/// Where a relationship endpoint id comes from.
enum Endpoint {
    /// The record's own entity id (needed for generated ids).
    Own,
    Column(usize),
}

enum BoundCrossing {
    Query { field_map: Vec<(usize, String)> },
    TextWalk {
        forward: BoundTemplate,
        reverse: BoundTemplate,
    },
}

struct BoundRelationship<'a> {
    relationship: &'a RelationshipType,
    source: Endpoint,
    target: Endpoint,
    crossing: BoundCrossing,
}

/// Turns the records of one file into graph instances for one entity type.
pub struct EntityBuilder<'a> {
    entity: &'a EntityType,
    id: BoundId,
    attributes: Vec<BoundAttribute>,
    relationships: Vec<BoundRelationship<'a>>,
}

impl<'a> EntityBuilder<'a> {
    /// Resolve every column the entity type declares against a record source.
    pub fn bind(entity: &'a EntityType, records: &dyn RecordSource) -> Result<Self> {
        let id = match &entity.id_column {
            IdColumn::Column(column) => BoundId::Column(records.require_column(column)?),
            IdColumn::Connector => BoundId::Connector,
            IdColumn::Generated => BoundId::Generated,
        };

        let attributes = entity
            .attributes
            .iter()
            .map(|spec| match spec {
                AttributeSpec::Column(name) => Ok(BoundAttribute::Column {
                    name: name.clone(),
                    index: records.require_column(name)?,
                }),
                AttributeSpec::Sentence(template) => {
                    Ok(BoundAttribute::Sentence(template.bind(records)?))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let id_token = match &entity.id_column {
            IdColumn::Column(column) => column.as_str(),
            IdColumn::Connector => "null",
            IdColumn::Generated => "generated",
        };
        let endpoint = |entity_type: &str, column: &str| -> Result<Endpoint> {
            if entity_type == entity.name && column == id_token {
                Ok(Endpoint::Own)
            } else {
                Ok(Endpoint::Column(records.require_column(column)?))
            }
        };

        let relationships = entity
            .relationships
            .iter()
            .map(|relationship| {
                let crossing = match &relationship.payload {
                    RelationshipPayload::Query { field_map } => BoundCrossing::Query {
                        field_map: field_map
                            .iter()
                            .map(|m| Ok((records.require_column(&m.column)?, m.attribute.clone())))
                            .collect::<Result<Vec<_>>>()?,
                    },
                    RelationshipPayload::TextWalk { forward, reverse } => BoundCrossing::TextWalk {
                        forward: forward.bind(records)?,
                        reverse: reverse.bind(records)?,
                    },
                };
                Ok(BoundRelationship {
                    relationship,
                    source: endpoint(&relationship.source_type, &relationship.source_column)?,
                    target: endpoint(&relationship.target_type, &relationship.target_column)?,
                    crossing,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entity,
            id,
            attributes,
            relationships,
        })
    }

    /// Apply one record to the graph.
    ///
    /// A blank id skips the record's own entity but still attempts its
    /// crossings. A crossing with a blank endpoint is skipped.
    pub fn process(&self, record: &Record, db: &mut Database, ctx: &mut BuildContext) {
        let name = self.entity.name.as_str();
        let id = match self.id {
            BoundId::Column(index) => record.get(index).trim().to_string(),
            BoundId::Connector => CONNECTOR_ID.to_string(),
            BoundId::Generated => ctx.next_generated_id(name),
        };

        if id.is_empty() {
            trace!(entity = name, "record without id, own entity skipped");
        } else if id != CONNECTOR_ID {
            self.apply_attributes(&id, record, db, ctx);
        }

        for bound in &self.relationships {
            let resolve = |endpoint: &Endpoint| match endpoint {
                Endpoint::Own if id != CONNECTOR_ID => id.clone(),
                Endpoint::Own => String::new(),
                Endpoint::Column(index) => record.get(*index).trim().to_string(),
            };
            let source_id = resolve(&bound.source);
            let target_id = resolve(&bound.target);
            if source_id.is_empty() || target_id.is_empty() {
                trace!(
                    source = %bound.relationship.source_type,
                    target = %bound.relationship.target_type,
                    "blank endpoint, crossing skipped"
                );
                continue;
            }

            let source = InstanceKey::new(&bound.relationship.source_type, source_id);
            let target = InstanceKey::new(&bound.relationship.target_type, target_id);
            let (forward, reverse) = match &bound.crossing {
                BoundCrossing::Query { .. } => (CrossingPayload::Query, CrossingPayload::Query),
                BoundCrossing::TextWalk { forward, reverse } => (
                    CrossingPayload::TextWalk {
                        sentence: forward.render(record),
                    },
                    CrossingPayload::TextWalk {
                        sentence: reverse.render(record),
                    },
                ),
            };
            db.link(&source, &target, forward, reverse);
            ctx.crossings += 1;

            if let BoundCrossing::Query { field_map } = &bound.crossing {
                for (index, attribute) in field_map {
                    let values = non_blank(record, *index);
                    ctx.record_field(&target.entity_type, attribute, &values);
                    let instance = db.find_or_create(&target.entity_type, &target.id);
                    for value in values {
                        instance.add_value(attribute, value);
                    }
                }
            }
        }
    }

    fn apply_attributes(&self, id: &str, record: &Record, db: &mut Database, ctx: &mut BuildContext) {
        let name = self.entity.name.as_str();
        let instance = db.find_or_create(name, id);
        for attribute in &self.attributes {
            match attribute {
                BoundAttribute::Column { name: column, index } => {
                    let values = non_blank(record, *index);
                    ctx.record_field(name, column, &values);
                    for value in values {
                        instance.add_value(column, value);
                    }
                }
                BoundAttribute::Sentence(template) => {
                    let sentence = template.render(record);
                    if !sentence.is_empty() {
                        instance.add_sentence(sentence);
                    }
                }
            }
        }
    }
}

fn non_blank(record: &Record, index: usize) -> Vec<&str> {
    record
        .get_all(index)
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Load every record of one source as instances of `entity`.
///
/// Returns the number of records read.
pub fn load_records(
    db: &mut Database,
    entity: &EntityType,
    records: &mut dyn RecordSource,
    ctx: &mut BuildContext,
) -> Result<usize> {
    let builder = EntityBuilder::bind(entity, &*records)?;
    let mut count = 0;
    while let Some(record) = records.next_record() {
        builder.process(&record?, db, ctx);
        count += 1;
    }
    ctx.files += 1;
    ctx.records += count;
    info!(
        entity = %entity.name,
        file = records.name(),
        records = count,
        "loaded entity file"
    );
    Ok(count)
}

/// Load one input directory, scanning entity types in priority order.
///
/// A type whose file is absent from the directory contributes nothing.
/// Returns the number of files loaded.
pub fn load_directory(
    db: &mut Database,
    schema: &Schema,
    dir: &Path,
    ctx: &mut BuildContext,
    config: &EngineConfig,
) -> Result<usize> {
    if schema.mode() != db.mode() {
        return Err(EngineError::WrongMode {
            expected: db.mode(),
            actual: schema.mode(),
        });
    }

    let mut loaded = 0;
    for entity in schema.ordered_types() {
        let Some(file_name) = &entity.file_name else {
            continue;
        };
        let path = dir.join(file_name);
        if !path.is_file() {
            debug!(entity = %entity.name, path = %path.display(), "no input file");
            continue;
        }
        let mut records = open_records(&path, &config.list_delimiter)?;
        load_records(db, entity, records.as_mut(), ctx)?;
        loaded += 1;
    }

    info!(
        dir = %dir.display(),
        files = loaded,
        instances = db.total_count(),
        crossings = ctx.crossings,
        "loaded input directory"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use er_schema::{MemoryRecords, Mode, SchemaError};

    #[test]
    fn test_genome_feature_scenario() {
        let (_, db) = text_scenario();

        assert_eq!(db.count("Genome"), 1);
        assert_eq!(db.count("Feature"), 2);

        let genome = db.get("Genome", "g1").unwrap();
        assert_eq!(genome.relationships.len(), 2);
        let mut targets: Vec<_> = genome.relationships.iter().map(|r| r.target.id.as_str()).collect();
        targets.sort();
        assert_eq!(targets, vec!["f1", "f2"]);

        for id in ["f1", "f2"] {
            let feature = db.get("Feature", id).unwrap();
            assert_eq!(feature.relationships.len(), 1);
            assert_eq!(feature.relationships[0].target, InstanceKey::new("Genome", "g1"));
            assert_eq!(feature.relationships[0].sentence(), Some("in Genome E. coli"));
        }

        let reverse: Vec<_> = genome.relationships.iter().filter_map(|r| r.sentence()).collect();
        assert!(reverse.contains(&"has Feature f1"));
        assert!(reverse.contains(&"has Feature f2"));
        assert_eq!(genome.sentences(), &["Genome g1 is called E. coli.".to_string()]);
    }

    #[test]
    fn test_feature_before_genome_creates_genome_lazily() {
        let schema = text_schema();
        let mut db = Database::new(Mode::TextWalk);
        let mut ctx = BuildContext::new();

        load_records(&mut db, schema.get("Feature").unwrap(), &mut feature_records(), &mut ctx).unwrap();
        assert_eq!(db.count("Genome"), 1);
        assert!(db.get("Genome", "g1").unwrap().sentences().is_empty());

        load_records(&mut db, schema.get("Genome").unwrap(), &mut genome_records(), &mut ctx).unwrap();
        assert_eq!(db.count("Genome"), 1);
        assert_eq!(db.get("Genome", "g1").unwrap().sentences().len(), 1);
        assert_eq!(db.get("Genome", "g1").unwrap().relationships.len(), 2);
        assert_eq!(ctx.files, 2);
        assert_eq!(ctx.records, 3);
        assert_eq!(ctx.crossings, 2);
    }

    #[test]
    fn test_blank_id_skips_own_side() {
        let schema = text_schema();
        let mut db = Database::new(Mode::TextWalk);
        let mut ctx = BuildContext::new();
        let mut records = MemoryRecords::from_rows(
            "feature.tbl",
            FEATURE_COLUMNS,
            &[&["", "g1", "E. coli", "kinase"]],
        );
        load_records(&mut db, schema.get("Feature").unwrap(), &mut records, &mut ctx).unwrap();

        // The relationship source is the blank feature id, so the crossing is skipped too.
        assert_eq!(db.count("Feature"), 0);
        assert_eq!(db.count("Genome"), 0);
        assert_eq!(ctx.records, 1);
        assert_eq!(ctx.crossings, 0);
    }

    #[test]
    fn test_blank_endpoint_skips_crossing_only() {
        let schema = text_schema();
        let mut db = Database::new(Mode::TextWalk);
        let mut ctx = BuildContext::new();
        let mut records = MemoryRecords::from_rows(
            "feature.tbl",
            FEATURE_COLUMNS,
            &[&["f9", "", "", "kinase"]],
        );
        load_records(&mut db, schema.get("Feature").unwrap(), &mut records, &mut ctx).unwrap();

        let feature = db.get("Feature", "f9").unwrap();
        assert!(feature.relationships.is_empty());
        assert_eq!(feature.sentences(), &["Feature f9 is a kinase.".to_string()]);
        assert_eq!(db.count("Genome"), 0);
    }

    #[test]
    fn test_missing_column_fails_before_reading() {
        let schema = text_schema();
        let mut db = Database::new(Mode::TextWalk);
        let mut ctx = BuildContext::new();
        let mut records = MemoryRecords::from_rows(
            "feature.tbl",
            &["patric_id", "genome_id"],
            &[&["f1", "g1"]],
        );
        let err = load_records(&mut db, schema.get("Feature").unwrap(), &mut records, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, EngineError::Schema(SchemaError::MissingColumn { .. })));
        assert_eq!(db.total_count(), 0);
        assert_eq!(ctx.records, 0);
    }

    #[test]
    fn test_rereading_duplicates_crossings_not_instances() {
        let schema = text_schema();
        let mut db = Database::new(Mode::TextWalk);
        let mut ctx = BuildContext::new();
        let feature = schema.get("Feature").unwrap();
        load_records(&mut db, feature, &mut feature_records(), &mut ctx).unwrap();
        load_records(&mut db, feature, &mut feature_records(), &mut ctx).unwrap();

        assert_eq!(db.count("Feature"), 2);
        assert_eq!(db.get("Feature", "f1").unwrap().relationships.len(), 2);
        assert_eq!(db.get("Feature", "f1").unwrap().sentences().len(), 2);
        assert_eq!(db.get("Genome", "g1").unwrap().relationships.len(), 4);
    }

    #[test]
    fn test_query_capture_and_stats() {
        let (_, db, ctx) = query_scenario_with_context();

        let genome = db.get("Genome", "g1").unwrap();
        assert_eq!(genome.values("genome_name"), &["E. coli".to_string()]);
        assert_eq!(genome.values("contigs"), &["3".to_string()]);

        let stats = ctx.field_stats("Genome", "contigs").unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.values, 1);
        assert_eq!(stats.numeric, 1);
        let reference = ctx.field_stats("Genome", "reference").unwrap();
        assert_eq!(reference.boolean, 1);
        assert!(ctx.field_stats("Genome", "nothing").is_none());
    }

    #[test]
    fn test_connector_relays_and_maps_fields() {
        let schema = Schema::parse(CONNECTOR_DEFS, "defs.txt", Mode::Query).unwrap();
        let mut db = Database::new(Mode::Query);
        let mut ctx = BuildContext::new();
        let mut records = MemoryRecords::from_rows(
            "feature_subsystem.tbl",
            &["patric_id", "subsystem_id", "role"],
            &[
                &["f1", "ss1", "Kinase role"],
                &["f2", "ss1", "Phosphatase role"],
                &["f3", "", "orphan"],
            ],
        );
        load_records(&mut db, schema.get("FeatureSubsystem").unwrap(), &mut records, &mut ctx)
            .unwrap();

        assert_eq!(db.count("FeatureSubsystem"), 0);
        assert_eq!(db.count("Feature"), 2);
        assert_eq!(db.count("Subsystem"), 1);

        let subsystem = db.get("Subsystem", "ss1").unwrap();
        assert_eq!(subsystem.relationships.len(), 2);
        assert_eq!(subsystem.values("role_name").len(), 2);
        assert!(db.get("Feature", "f3").is_none());
    }

    #[test]
    fn test_generated_ids() {
        let defs = "\
#Entity Genome genome_id 1 genome.tbl
#Entity Contig generated 1 contig.tbl
length
#Relationship Contig generated Genome genome_id
";
        let schema = Schema::parse(defs, "defs.txt", Mode::Query).unwrap();
        let mut db = Database::new(Mode::Query);
        let mut ctx = BuildContext::new();
        let mut records = MemoryRecords::from_rows(
            "contig.tbl",
            &["genome_id", "length"],
            &[&["g1", "1200"], &["g1", "800"]],
        );
        load_records(&mut db, schema.get("Contig").unwrap(), &mut records, &mut ctx).unwrap();

        assert_eq!(db.ids("Contig"), vec!["Contig:1", "Contig:2"]);
        assert_eq!(db.get("Contig", "Contig:2").unwrap().values("length"), &["800".to_string()]);
        assert_eq!(db.get("Genome", "g1").unwrap().relationships.len(), 2);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("genome.tbl"),
            "genome_id\tgenome_name\tcontigs\treference\ng1\tE. coli\t3\ttrue\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("feature.json"),
            r#"[{"patric_id": "f1", "genome_id": "g1", "product": "kinase"}]"#,
        )
        .unwrap();

        let defs = QUERY_DEFS.replace("feature.tbl", "feature.json");
        let schema = Schema::parse(&defs, "defs.txt", Mode::Query).unwrap();
        let mut db = Database::new(Mode::Query);
        let mut ctx = BuildContext::new();
        let loaded =
            load_directory(&mut db, &schema, dir.path(), &mut ctx, &EngineConfig::default()).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(db.count("Genome"), 1);
        assert_eq!(db.count("Feature"), 1);
        assert_eq!(db.get("Feature", "f1").unwrap().values("product"), &["kinase".to_string()]);

        // A second directory without a feature file is fine.
        let empty = tempfile::tempdir().unwrap();
        let loaded =
            load_directory(&mut db, &schema, empty.path(), &mut ctx, &EngineConfig::default()).unwrap();
        assert_eq!(loaded, 0);
    }

    #[test]
    fn test_load_directory_mode_mismatch() {
        let schema = text_schema();
        let mut db = Database::new(Mode::Query);
        let dir = tempfile::tempdir().unwrap();
        let result = load_directory(
            &mut db,
            &schema,
            dir.path(),
            &mut BuildContext::new(),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(EngineError::WrongMode { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" y "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
