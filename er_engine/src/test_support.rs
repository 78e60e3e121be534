//! Shared fixtures for engine tests.

use er_schema::{MemoryRecords, Mode, Schema};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::database::{load_records, BuildContext, Database};

pub const TEXT_DEFS: &str = "\
#Entity Genome genome_id 10 genome.tbl
Genome {{genome_id}} is called {{genome_name}}.
#Entity Feature patric_id 5 feature.tbl
Feature {{patric_id}} is a {{product}}.
#Relationship Feature patric_id Genome genome_id
in Genome {{genome.genome_name}}
has Feature {{feature.patric_id}}
";

pub const QUERY_DEFS: &str = "\
#Entity Genome genome_id 10 genome.tbl
genome_name
contigs
reference
#Entity Feature patric_id 5 feature.tbl
product
#Relationship Feature patric_id Genome genome_id
";

pub const CONNECTOR_DEFS: &str = "\
#Entity Feature patric_id 5 feature.tbl
#Entity Subsystem subsystem_id 1 subsystem.tbl
#Entity FeatureSubsystem null 0 feature_subsystem.tbl
#Relationship Feature patric_id Subsystem subsystem_id role:role_name
";

pub const GENOME_COLUMNS: &[&str] = &["genome_id", "genome_name", "contigs", "reference"];
pub const FEATURE_COLUMNS: &[&str] = &["patric_id", "genome_id", "genome_name", "product"];

pub fn genome_records() -> MemoryRecords {
    MemoryRecords::from_rows("genome.tbl", GENOME_COLUMNS, &[&["g1", "E. coli", "3", "true"]])
}

pub fn feature_records() -> MemoryRecords {
    MemoryRecords::from_rows(
        "feature.tbl",
        FEATURE_COLUMNS,
        &[
            &["f1", "g1", "E. coli", "kinase"],
            &["f2", "g1", "E. coli", "transporter"],
        ],
    )
}

pub fn text_schema() -> Schema {
    Schema::parse(TEXT_DEFS, "defs.txt", Mode::TextWalk).unwrap()
}

pub fn query_schema() -> Schema {
    Schema::parse(QUERY_DEFS, "defs.txt", Mode::Query).unwrap()
}

fn load(schema: &Schema, mut genomes: MemoryRecords, mut features: MemoryRecords) -> (Database, BuildContext) {
    let mut db = Database::new(schema.mode());
    let mut ctx = BuildContext::new();
    load_records(&mut db, schema.get("Genome").unwrap(), &mut genomes, &mut ctx).unwrap();
    load_records(&mut db, schema.get("Feature").unwrap(), &mut features, &mut ctx).unwrap();
    (db, ctx)
}

/// One genome with two features, loaded for random walks and shuffled.
pub fn text_scenario() -> (Schema, Database) {
    let schema = text_schema();
    let (mut db, _) = load(&schema, genome_records(), feature_records());
    db.finish_load(&mut StdRng::seed_from_u64(7));
    (schema, db)
}

/// One genome with two features, loaded for proposals.
pub fn query_scenario() -> (Schema, Database) {
    let (schema, db, _) = query_scenario_with_context();
    (schema, db)
}

pub fn query_scenario_with_context() -> (Schema, Database, BuildContext) {
    let schema = query_schema();
    let (db, ctx) = load(&schema, genome_records(), feature_records());
    (schema, db, ctx)
}

/// Three genomes with differing sizes and features, loaded for proposals.
pub fn query_catalog() -> (Schema, Database) {
    let schema = query_schema();
    let genomes = MemoryRecords::from_rows(
        "genome.tbl",
        GENOME_COLUMNS,
        &[
            &["g1", "E. coli", "3", "true"],
            &["g2", "B. subtilis", "12", "false"],
            &["g3", "S. aureus", "7", "yes"],
        ],
    );
    let features = MemoryRecords::from_rows(
        "feature.tbl",
        FEATURE_COLUMNS,
        &[
            &["f1", "g1", "", "kinase"],
            &["f2", "g1", "", "transporter"],
            &["f3", "g2", "", "kinase"],
            &["f4", "g2", "", "permease"],
            &["f5", "g2", "", "ligase"],
            &["f6", "g3", "", "helicase"],
            &["f7", "g3", "", "polymerase"],
        ],
    );
    let (db, _) = load(&schema, genomes, features);
    (schema, db)
}
