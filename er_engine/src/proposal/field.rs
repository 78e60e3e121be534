//! Field constraints inside question placeholders.
//!
//! A placeholder body is `[op] entity.field`:
//!
//! | op      | meaning                                      |
//! |---------|----------------------------------------------|
//! | (none)  | bind each value exactly                      |
//! | `?`     | pass when any value is truthy, bind nothing  |
//! | `<` `>` | bind every threshold above / below the value |
//! | `=`     | bind the numeric value itself                |

use serde::{Deserialize, Serialize};

use crate::database::parse_bool;
use crate::error::{EngineError, Result};

/// A parsed `entity.field` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub entity: String,
    pub field: String,
}

impl FieldRef {
    /// Parse `entity.field`. Both parts must match `[A-Za-z0-9_]+`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split('.').collect();
        if parts.len() != 2 {
            return Err(EngineError::invalid_field(spec, "expected <entity>.<field>"));
        }
        for part in &parts {
            let valid = !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(EngineError::invalid_field(
                    spec,
                    format!("bad name \"{}\"", part),
                ));
            }
        }
        Ok(Self {
            entity: parts[0].to_string(),
            field: parts[1].to_string(),
        })
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Less,
    Greater,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOp {
    Exact,
    Boolean,
    Compare(CompareOp),
}

impl FieldOp {
    /// Whether the op contributes values to a parameterization.
    pub fn binds(&self) -> bool {
        !matches!(self, FieldOp::Boolean)
    }
}

/// Result of evaluating a field against one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// The branch dies.
    Rejected,
    /// The branch survives without binding anything.
    Passed,
    /// The branch survives once per value.
    Bound(Vec<String>),
}

/// One constrained field of a proposal query.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalField {
    pub op: FieldOp,
    pub field: FieldRef,
    /// Placeholder body as written in the question.
    pub placeholder: String,
    /// Position of this field's value among its entity's bound values.
    pub slot: Option<usize>,
    thresholds: Vec<(f64, String)>,
}

impl ProposalField {
    /// Parse a placeholder body such as `< genome.contigs`.
    pub fn parse(body: &str) -> Result<Self> {
        let body = body.trim();
        let (op, rest) = match body.chars().next() {
            Some('?') => (FieldOp::Boolean, &body[1..]),
            Some('<') => (FieldOp::Compare(CompareOp::Less), &body[1..]),
            Some('>') => (FieldOp::Compare(CompareOp::Greater), &body[1..]),
            Some('=') => (FieldOp::Compare(CompareOp::Equal), &body[1..]),
            _ => (FieldOp::Exact, body),
        };
        Ok(Self {
            op,
            field: FieldRef::parse(rest.trim())?,
            placeholder: body.to_string(),
            slot: None,
            thresholds: Vec::new(),
        })
    }

    /// Whether thresholds must be collected from the graph before evaluating.
    pub fn needs_thresholds(&self) -> bool {
        matches!(
            self.op,
            FieldOp::Compare(CompareOp::Less) | FieldOp::Compare(CompareOp::Greater)
        )
    }

    /// Install thresholds chosen from observed values.
    pub fn set_thresholds(&mut self, observed: &[String], max: usize) {
        self.thresholds = select_thresholds(observed, max);
    }

    /// Threshold values, ascending.
    pub fn thresholds(&self) -> impl Iterator<Item = &str> {
        self.thresholds.iter().map(|(_, text)| text.as_str())
    }

    /// Evaluate the field against an instance's values.
    pub fn evaluate(&self, values: &[String]) -> FieldOutcome {
        let bound: Vec<String> = match self.op {
            FieldOp::Exact => values.to_vec(),
            FieldOp::Boolean => {
                return if values.iter().any(|v| parse_bool(v) == Some(true)) {
                    FieldOutcome::Passed
                } else {
                    FieldOutcome::Rejected
                };
            }
            FieldOp::Compare(CompareOp::Equal) => values
                .iter()
                .filter(|v| parse_number(v).is_some())
                .cloned()
                .collect(),
            FieldOp::Compare(op) => {
                let numbers: Vec<f64> = values.iter().filter_map(|v| parse_number(v)).collect();
                self.thresholds
                    .iter()
                    .filter(|(t, _)| {
                        numbers.iter().any(|v| match op {
                            CompareOp::Less => v < t,
                            _ => v > t,
                        })
                    })
                    .map(|(_, text)| text.clone())
                    .collect()
            }
        };

        if bound.is_empty() {
            FieldOutcome::Rejected
        } else {
            FieldOutcome::Bound(bound)
        }
    }
}

/// Parse a finite number.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Pick up to `max` evenly spaced distinct numeric values. 0 keeps all.
fn select_thresholds(observed: &[String], max: usize) -> Vec<(f64, String)> {
    let mut numbers: Vec<(f64, String)> = observed
        .iter()
        .filter_map(|v| parse_number(v).map(|n| (n, v.trim().to_string())))
        .collect();
    numbers.sort_by(|a, b| a.0.total_cmp(&b.0));
    numbers.dedup_by(|a, b| a.0 == b.0);

    if max == 0 || numbers.len() <= max {
        return numbers;
    }
    if max == 1 {
        return vec![numbers[numbers.len() / 2].clone()];
    }
    let last = numbers.len() - 1;
    (0..max)
        .map(|i| numbers[i * last / (max - 1)].clone())
        .collect()
}
