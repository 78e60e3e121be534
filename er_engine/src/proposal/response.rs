//! Response sets - concrete paths grouped by parameterization.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::Parameterization;
use crate::database::InstanceKey;

/// One concrete path through the graph, one instance per path step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProposalResponse(pub Vec<InstanceKey>);

impl ProposalResponse {
    /// The instance at one path step.
    pub fn step(&self, index: usize) -> Option<&InstanceKey> {
        self.0.get(index)
    }
}

/// Every response sharing one parameterization.
///
/// The counter moves on every addition. Once the stored responses reach the
/// response limit the set turns inactive: stored responses are dropped and
/// only the counter keeps moving. It never turns active again.
#[derive(Debug, Clone)]
pub struct ProposalResponseSet {
    parameters: Parameterization,
    responses: BTreeSet<ProposalResponse>,
    active: bool,
    count: usize,
}

impl ProposalResponseSet {
    pub fn new(parameters: Parameterization) -> Self {
        Self {
            parameters,
            responses: BTreeSet::new(),
            active: true,
            count: 0,
        }
    }

    /// Add a response. `limit` of 0 means unbounded.
    pub fn add(&mut self, response: ProposalResponse, limit: usize) {
        self.count += 1;
        if !self.active {
            return;
        }
        self.responses.insert(response);
        if limit > 0 && self.responses.len() >= limit {
            self.active = false;
            self.responses.clear();
            debug!(parameters = %self.parameters, limit, "response set deactivated");
        }
    }

    pub fn parameters(&self) -> &Parameterization {
        &self.parameters
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Responses currently stored.
    pub fn size(&self) -> usize {
        self.responses.len()
    }

    /// Additions ever counted, including those made after deactivation.
    pub fn response_count(&self) -> usize {
        self.count
    }

    pub fn responses(&self) -> impl Iterator<Item = &ProposalResponse> {
        self.responses.iter()
    }
}

/// Response sets keyed by parameterization.
#[derive(Debug, Clone, Default)]
pub struct ProposalSets {
    sets: HashMap<Parameterization, ProposalResponseSet>,
    limit: usize,
}

impl ProposalSets {
    /// Create an empty collection. `limit` caps each set; 0 means unbounded.
    pub fn new(limit: usize) -> Self {
        Self {
            sets: HashMap::new(),
            limit,
        }
    }

    pub fn add(&mut self, parameters: Parameterization, response: ProposalResponse) {
        let limit = self.limit;
        self.sets
            .entry(parameters)
            .or_insert_with_key(|key| ProposalResponseSet::new(key.clone()))
            .add(response, limit);
    }

    pub fn get(&self, parameters: &Parameterization) -> Option<&ProposalResponseSet> {
        self.sets.get(parameters)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets ordered by their flattened parameter values.
    pub fn sorted(&self) -> Vec<&ProposalResponseSet> {
        let mut sets: Vec<_> = self.sets.values().collect();
        sets.sort_by(|a, b| a.parameters.cmp(&b.parameters));
        sets
    }

    /// Total responses counted across every set.
    pub fn total_responses(&self) -> usize {
        self.sets.values().map(|s| s.response_count()).sum()
    }
}
