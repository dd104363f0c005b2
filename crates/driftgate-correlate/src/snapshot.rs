//! Read-only view of the expanded findings handed to correlation
//! strategies.

use std::collections::HashSet;
use std::sync::Arc;

use driftgate_core::{pair_key, DriftFinding, DriftType};
use driftgate_parser::CodeIndex;

pub struct Snapshot {
    pub findings: Vec<DriftFinding>,
    pub code_index: Arc<CodeIndex>,
    pub call_graph_depth: usize,
    /// `None` while low-budget strategies run the full cross-product;
    /// the candidate pair keys afterwards.
    pub candidates: Option<HashSet<String>>,
}

impl Snapshot {
    pub fn new(findings: Vec<DriftFinding>, code_index: Arc<CodeIndex>, depth: usize) -> Self {
        Self {
            findings,
            code_index,
            call_graph_depth: depth,
            candidates: None,
        }
    }

    pub fn by_type(&self, drift_type: DriftType) -> impl Iterator<Item = &DriftFinding> {
        self.findings
            .iter()
            .filter(move |f| f.drift_type == drift_type)
    }

    pub fn id_of<'a>(&self, finding: &'a DriftFinding) -> &'a str {
        finding.artifact_id.as_deref().unwrap_or("")
    }

    /// Whether a pair is in scope for the current phase.
    pub fn pair_allowed(&self, a: &str, b: &str) -> bool {
        match &self.candidates {
            None => true,
            Some(set) => set.contains(&pair_key(a, b)),
        }
    }
}
