//! Query proposal engine - generates question/answer sets from a query graph.
//!
//! A [`ProposalQuery`] couples a question template with a path of entity
//! types:
//! 1. **Parse**: each `{{op entity.field}}` placeholder becomes a field owned
//!    by the first path step of that type
//! 2. **Expand**: starting at every instance of the first type, the path is
//!    walked breadth-first; each field rejects, passes, or binds values
//! 3. **Group**: completed paths are collected into response sets keyed by
//!    their bound values
//! 4. **Report**: each set becomes one list, count, or multiple-choice answer

mod field;
mod parameterization;
mod response;

pub use field::*;
pub use parameterization::*;
pub use response::*;

use std::collections::BTreeSet;

use er_schema::{Mode, Schema, Template};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::database::{Database, EntityInstance, InstanceKey};
use crate::error::{EngineError, Result};

/// Number of wrong answers offered with a multiple-choice question.
pub const MAX_DISTRACTORS: usize = 3;

/// The shape of answer a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    List,
    Count,
    Choice,
}

/// One step of a proposal path.
#[derive(Debug, Clone)]
pub struct ProposalEntity {
    pub entity_type: String,
    id_column: Option<String>,
    pub fields: Vec<ProposalField>,
}

impl ProposalEntity {
    /// Values of a field on an instance, falling back to the id for the id column.
    fn values(&self, instance: &EntityInstance, field: &str) -> Vec<String> {
        instance_values(instance, self.id_column.as_deref(), field)
    }
}

fn instance_values(instance: &EntityInstance, id_column: Option<&str>, field: &str) -> Vec<String> {
    let values = instance.values(field);
    if values.is_empty() && id_column == Some(field) {
        vec![instance.id.clone()]
    } else {
        values.to_vec()
    }
}

/// The field whose values answer the question.
#[derive(Debug, Clone)]
struct OutputField {
    step: usize,
    field: FieldRef,
    entity_type: String,
    id_column: Option<String>,
}

impl OutputField {
    fn values(&self, db: &Database, response: &ProposalResponse) -> Vec<String> {
        response
            .step(self.step)
            .and_then(|key| db.get_key(key))
            .map(|instance| instance_values(instance, self.id_column.as_deref(), &self.field.field))
            .unwrap_or_default()
    }
}

/// One answer handed to a reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposalAnswer {
    List {
        question: String,
        answers: Vec<String>,
    },
    Count {
        question: String,
        count: usize,
    },
    Choice {
        question: String,
        correct: String,
        distractors: Vec<String>,
    },
}

/// Receives generated answers.
pub trait ProposalReporter {
    fn report(&mut self, answer: ProposalAnswer) -> Result<()>;
}

impl ProposalReporter for Vec<ProposalAnswer> {
    fn report(&mut self, answer: ProposalAnswer) -> Result<()> {
        self.push(answer);
        Ok(())
    }
}

/// Totals for one reporting run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub reported: usize,
    /// Sets skipped because they had been deactivated.
    pub skipped_inactive: usize,
    /// Active sets skipped because they had no answer to give.
    pub skipped_empty: usize,
}

/// A question template plus the path it is answered over.
#[derive(Debug, Clone)]
pub struct ProposalQuery {
    kind: QueryKind,
    template: Template,
    path: Vec<ProposalEntity>,
    output: Option<OutputField>,
}

impl ProposalQuery {
    /// Build a query against a query-mode schema.
    ///
    /// `path` is a whitespace-separated list of entity type names. `output`
    /// names the answering field as `entity.field`; it is required for list
    /// and choice queries and forbidden for count queries.
    pub fn parse(
        kind: QueryKind,
        template: &str,
        path: &str,
        output: Option<&str>,
        schema: &Schema,
    ) -> Result<Self> {
        if schema.mode() != Mode::Query {
            return Err(EngineError::WrongMode {
                expected: Mode::Query,
                actual: schema.mode(),
            });
        }

        let mut steps = Vec::new();
        for name in path.split_whitespace() {
            let entity = schema
                .get(name)
                .ok_or_else(|| EngineError::invalid_query(format!("unknown entity type \"{}\"", name)))?;
            if entity.is_connector() {
                return Err(EngineError::invalid_query(format!(
                    "connector type \"{}\" cannot be a path step",
                    name
                )));
            }
            steps.push(ProposalEntity {
                entity_type: entity.name.clone(),
                id_column: entity.id_column.column().map(String::from),
                fields: Vec::new(),
            });
        }
        if steps.is_empty() {
            return Err(EngineError::invalid_query("empty path"));
        }

        let template = Template::parse(template)?;
        let mut seen = Vec::new();
        for body in template.fields() {
            if seen.contains(&body) {
                continue;
            }
            seen.push(body);
            let mut field = ProposalField::parse(body)?;
            let step = resolve_step(&steps, &field.field, schema)?;
            if field.op.binds() {
                let slot = steps[step].fields.iter().filter(|f| f.op.binds()).count();
                field.slot = Some(slot);
            }
            steps[step].fields.push(field);
        }

        let output = match (kind, output) {
            (QueryKind::Count, Some(spec)) => {
                return Err(EngineError::invalid_query(format!(
                    "count queries take no output field, got \"{}\"",
                    spec
                )))
            }
            (QueryKind::Count, None) => None,
            (_, None) => {
                return Err(EngineError::invalid_query(
                    "list and choice queries need an output field",
                ))
            }
            (_, Some(spec)) => {
                let field = FieldRef::parse(spec.trim())?;
                let step = resolve_step(&steps, &field, schema)?;
                Some(OutputField {
                    step,
                    entity_type: steps[step].entity_type.clone(),
                    id_column: steps[step].id_column.clone(),
                    field,
                })
            }
        };

        debug!(
            %kind,
            path = steps.len(),
            fields = steps.iter().map(|s| s.fields.len()).sum::<usize>(),
            "parsed proposal query"
        );
        Ok(Self {
            kind,
            template,
            path: steps,
            output,
        })
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Path steps in order.
    pub fn path(&self) -> &[ProposalEntity] {
        &self.path
    }

    /// Expand the path over the graph and group the results.
    pub fn compute_sets(&self, db: &Database, config: &EngineConfig) -> Result<ProposalSets> {
        if db.mode() != Mode::Query {
            return Err(EngineError::WrongMode {
                expected: Mode::Query,
                actual: db.mode(),
            });
        }

        let path = self.prepare_path(db, config.max_thresholds);
        let mut sets = ProposalSets::new(config.max_response_limit);

        for start_id in db.ids(&path[0].entity_type) {
            let Some(start) = db.get(&path[0].entity_type, &start_id) else {
                continue;
            };
            let mut frontier = dedup_branches(expand_step(
                &path[0],
                start,
                Parameterization::new(),
                Vec::new(),
            ));

            for step in &path[1..] {
                let mut next = Vec::new();
                for (parameters, keys) in frontier {
                    let Some(last) = keys.last().and_then(|key| db.get_key(key)) else {
                        continue;
                    };
                    for crossing in last.relationships_to(&step.entity_type) {
                        if let Some(target) = db.get_key(&crossing.target) {
                            next.extend(expand_step(step, target, parameters.clone(), keys.clone()));
                        }
                    }
                }
                frontier = dedup_branches(next);
                if frontier.is_empty() {
                    break;
                }
            }

            for (parameters, keys) in frontier {
                sets.add(parameters, ProposalResponse(keys));
            }
        }

        info!(
            kind = %self.kind,
            sets = sets.len(),
            responses = sets.total_responses(),
            "computed proposal sets"
        );
        Ok(sets)
    }

    /// Render the question for one parameterization.
    pub fn question(&self, parameters: &Parameterization) -> String {
        self.template.render_with(|body| {
            self.path
                .iter()
                .find_map(|step| {
                    step.fields
                        .iter()
                        .find(|f| f.placeholder == body)
                        .map(|f| (step, f))
                })
                .and_then(|(step, field)| {
                    field
                        .slot
                        .and_then(|slot| parameters.values_for(&step.entity_type).get(slot))
                        .cloned()
                })
                .unwrap_or_default()
        })
    }

    /// Turn each response set into an answer, in parameter order.
    pub fn report<R: Rng + ?Sized>(
        &self,
        sets: &ProposalSets,
        db: &Database,
        rng: &mut R,
        reporter: &mut dyn ProposalReporter,
    ) -> Result<ReportStats> {
        let mut stats = ReportStats::default();
        let sorted = sets.sorted();
        let outputs: Vec<BTreeSet<String>> = sorted
            .iter()
            .map(|set| self.output_values(set, db))
            .collect();

        for (index, set) in sorted.iter().enumerate() {
            let question = self.question(set.parameters());
            let answer = match self.kind {
                QueryKind::Count => Some(ProposalAnswer::Count {
                    question,
                    count: set.response_count(),
                }),
                QueryKind::List => {
                    let answers: Vec<String> = outputs[index].iter().cloned().collect();
                    (!answers.is_empty()).then_some(ProposalAnswer::List { question, answers })
                }
                QueryKind::Choice => {
                    let own = &outputs[index];
                    let choices: Vec<&String> = own.iter().collect();
                    choices.choose(rng).map(|correct| ProposalAnswer::Choice {
                        question,
                        correct: correct.to_string(),
                        distractors: self.distractors(index, &outputs, db, rng),
                    })
                }
            };

            match answer {
                Some(answer) => {
                    reporter.report(answer)?;
                    stats.reported += 1;
                }
                None if !set.is_active() => {
                    debug!(
                        parameters = %set.parameters(),
                        count = set.response_count(),
                        "inactive response set skipped"
                    );
                    stats.skipped_inactive += 1;
                }
                None => stats.skipped_empty += 1,
            }
        }

        info!(
            kind = %self.kind,
            reported = stats.reported,
            skipped_inactive = stats.skipped_inactive,
            skipped_empty = stats.skipped_empty,
            "reported proposals"
        );
        Ok(stats)
    }

    /// Distinct output values of a set's stored responses, sorted.
    ///
    /// An inactive set has no stored responses and so yields nothing.
    pub fn output_values(&self, set: &ProposalResponseSet, db: &Database) -> BTreeSet<String> {
        let Some(output) = &self.output else {
            return BTreeSet::new();
        };
        set.responses()
            .flat_map(|response| output.values(db, response))
            .collect()
    }

    /// Wrong answers for set `index`: other sets' outputs first, then a
    /// scan of the whole graph.
    fn distractors<R: Rng + ?Sized>(
        &self,
        index: usize,
        outputs: &[BTreeSet<String>],
        db: &Database,
        rng: &mut R,
    ) -> Vec<String> {
        let own = &outputs[index];
        let mut others: Vec<String> = outputs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .flat_map(|(_, values)| values.iter())
            .filter(|v| !own.contains(*v))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        others.shuffle(rng);
        others.truncate(MAX_DISTRACTORS);

        if others.len() < MAX_DISTRACTORS {
            if let Some(output) = &self.output {
                let mut scanned: Vec<String> = db
                    .instances(&output.entity_type)
                    .flat_map(|instance| {
                        instance_values(instance, output.id_column.as_deref(), &output.field.field)
                    })
                    .filter(|v| !own.contains(v) && !others.contains(v))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                scanned.shuffle(rng);
                scanned.truncate(MAX_DISTRACTORS - others.len());
                others.extend(scanned);
            }
        }
        others
    }

    /// A copy of the path with comparison thresholds collected from the graph.
    fn prepare_path(&self, db: &Database, max_thresholds: usize) -> Vec<ProposalEntity> {
        let mut path = self.path.clone();
        for step in &mut path {
            let id_column = step.id_column.clone();
            for field in step.fields.iter_mut().filter(|f| f.needs_thresholds()) {
                let observed: Vec<String> = db
                    .instances(&step.entity_type)
                    .flat_map(|instance| {
                        instance_values(instance, id_column.as_deref(), &field.field.field)
                    })
                    .collect();
                field.set_thresholds(&observed, max_thresholds);
                debug!(
                    field = %field.field,
                    thresholds = field.thresholds().count(),
                    "selected comparison thresholds"
                );
            }
        }
        path
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::List => write!(f, "list"),
            QueryKind::Count => write!(f, "count"),
            QueryKind::Choice => write!(f, "choice"),
        }
    }
}

/// The first path step whose type matches the field's entity, ignoring case.
fn resolve_step(steps: &[ProposalEntity], field: &FieldRef, schema: &Schema) -> Result<usize> {
    let step = steps
        .iter()
        .position(|s| s.entity_type.eq_ignore_ascii_case(&field.entity))
        .ok_or_else(|| {
            EngineError::invalid_field(field.to_string(), "entity is not on the path")
        })?;
    if !schema
        .known_fields(&steps[step].entity_type)
        .iter()
        .any(|known| known == &field.field)
    {
        return Err(EngineError::invalid_field(
            field.to_string(),
            format!("{} has no such field", steps[step].entity_type),
        ));
    }
    Ok(step)
}

/// Collapse branches that reached the same instances with the same values.
///
/// Duplicate crossings (a file read twice) otherwise produce the same path
/// more than once.
fn dedup_branches(
    mut branches: Vec<(Parameterization, Vec<InstanceKey>)>,
) -> Vec<(Parameterization, Vec<InstanceKey>)> {
    branches.sort();
    branches.dedup();
    branches
}

/// Evaluate one step's fields against an instance, exploding multi-valued bindings.
fn expand_step(
    step: &ProposalEntity,
    instance: &EntityInstance,
    parameters: Parameterization,
    mut keys: Vec<InstanceKey>,
) -> Vec<(Parameterization, Vec<InstanceKey>)> {
    let mut branches = vec![parameters];
    for field in &step.fields {
        match field.evaluate(&step.values(instance, &field.field.field)) {
            FieldOutcome::Rejected => return Vec::new(),
            FieldOutcome::Passed => {}
            FieldOutcome::Bound(values) => {
                let mut exploded = Vec::with_capacity(branches.len() * values.len());
                for branch in &branches {
                    for value in &values {
                        exploded.push(branch.with(&step.entity_type, value.as_str()));
                    }
                }
                branches = exploded;
            }
        }
    }
    keys.push(instance.key());
    branches.into_iter().map(|p| (p, keys.clone())).collect()
}
