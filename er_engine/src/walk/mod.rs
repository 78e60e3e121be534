//! Random-walk generator - turns a text-walk graph into prose.
//!
//! The walk is destructive:
//! 1. **Start**: every undeleted instance, in type-priority order
//! 2. **Step**: pop one sentence, then pop one crossing and follow it
//! 3. **Delete**: an instance with nothing left to pop is marked deleted
//! 4. **Compact**: deleted instances leave the graph at the end of each pass
//!
//! Passes repeat until the working list is empty, so every sentence and every
//! crossing is emitted exactly once.

use std::collections::HashSet;
use std::io::Write;

use er_schema::{Mode, Schema};
use serde::Serialize;
use tracing::{debug, info};

use crate::database::{Database, InstanceKey};
use crate::error::{EngineError, Result};

/// Counts the tokens in generated text.
pub trait Tokenizer {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Splits on Unicode whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Totals for one walk generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Non-empty walks written.
    pub walks: usize,
    pub passes: usize,
    /// Attribute sentences emitted.
    pub attributes: usize,
    /// Crossing sentences emitted.
    pub crossings: usize,
    pub tokens: usize,
    /// Instances deleted and compacted away.
    pub deletions: usize,
}

/// Generates random walks over a text-walk graph.
pub struct RandomWalker {
    type_order: Vec<String>,
    tokenizer: Box<dyn Tokenizer>,
}

impl RandomWalker {
    /// Create a walker that starts walks in the given type order.
    pub fn new(type_order: Vec<String>, tokenizer: Box<dyn Tokenizer>) -> Self {
        Self {
            type_order,
            tokenizer,
        }
    }

    /// Create a walker using the schema's priority order and whitespace tokens.
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new(schema.ordered_names().to_vec(), Box::new(WhitespaceTokenizer))
    }

    /// Replace the tokenizer.
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Walk the graph until it is empty, writing one line per non-empty walk.
    ///
    /// The database must have been loaded in text-walk mode. It is drained:
    /// on success no instances remain.
    pub fn generate_walk(&self, db: &mut Database, out: &mut dyn Write) -> Result<WalkStats> {
        if db.mode() != Mode::TextWalk {
            return Err(EngineError::WrongMode {
                expected: Mode::TextWalk,
                actual: db.mode(),
            });
        }

        let mut stats = WalkStats::default();
        let mut working = self.working_list(db);

        while !working.is_empty() {
            stats.passes += 1;
            let mut to_delete = Vec::new();

            for start in &working {
                let sentences = self.walk_from(db, start, &mut stats, &mut to_delete);
                if !sentences.is_empty() {
                    writeln!(out, "{}", sentences.join(" "))?;
                    stats.walks += 1;
                }
            }

            let deleted: HashSet<InstanceKey> = to_delete.into_iter().collect();
            for key in &deleted {
                db.remove(&key.entity_type, &key.id);
            }
            working.retain(|key| !deleted.contains(key));
            stats.deletions += deleted.len();
            debug!(
                pass = stats.passes,
                deleted = deleted.len(),
                remaining = working.len(),
                "walk pass complete"
            );
        }

        out.flush()?;
        info!(
            walks = stats.walks,
            passes = stats.passes,
            attributes = stats.attributes,
            crossings = stats.crossings,
            tokens = stats.tokens,
            "random walks generated"
        );
        Ok(stats)
    }

    /// Every instance, types in walk order, ids sorted within a type.
    fn working_list(&self, db: &Database) -> Vec<InstanceKey> {
        let mut names: Vec<&str> = self.type_order.iter().map(String::as_str).collect();
        for name in db.type_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
            .into_iter()
            .flat_map(|name| {
                db.ids(name)
                    .into_iter()
                    .map(move |id| InstanceKey::new(name, id))
            })
            .collect()
    }

    fn walk_from(
        &self,
        db: &mut Database,
        start: &InstanceKey,
        stats: &mut WalkStats,
        to_delete: &mut Vec<InstanceKey>,
    ) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = Some(start.clone());

        while let Some(key) = current.take() {
            let Some(instance) = db.get_mut(&key.entity_type, &key.id) else {
                break;
            };
            if instance.is_deleted() {
                break;
            }

            let attribute = instance.pop_sentence();
            let crossing = instance.pop_relationship();
            if attribute.is_none() && crossing.is_none() {
                instance.mark_deleted();
                to_delete.push(key);
                break;
            }

            if let Some(sentence) = attribute {
                stats.attributes += 1;
                stats.tokens += self.tokenizer.count_tokens(&sentence);
                sentences.push(sentence);
            }
            if let Some(crossing) = crossing {
                if let Some(sentence) = crossing.sentence() {
                    stats.crossings += 1;
                    stats.tokens += self.tokenizer.count_tokens(sentence);
                    sentences.push(sentence.to_string());
                }
                current = Some(crossing.target);
            }
        }

        sentences
    }
}
