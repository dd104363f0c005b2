//! REST verb / database operation alignment.

use driftgate_core::{DriftType, Evidence, Result, Signal};

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

/// SQL keywords a verb aligns with, as they appear in change indicators.
fn aligned_ops(method: &str) -> &'static [&'static str] {
    match method {
        "GET" => &["SELECT"],
        "POST" => &["INSERT", "CREATE TABLE"],
        "PUT" | "PATCH" => &["UPDATE", "ALTER"],
        "DELETE" => &["DELETE", "DROP", "TRUNCATE"],
        _ => &[],
    }
}

pub struct OperationStrategy;

impl CorrelationStrategy for OperationStrategy {
    fn name(&self) -> &'static str {
        "operation"
    }

    fn default_weight(&self) -> f64 {
        0.5
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();
        for api in snapshot.by_type(DriftType::Api) {
            let Some(endpoint) = api.endpoints.first() else {
                continue;
            };
            let method = endpoint
                .split_once(':')
                .map(|(m, _)| m.to_uppercase())
                .unwrap_or_default();
            let ops = aligned_ops(&method);
            if ops.is_empty() {
                continue;
            }
            for db in snapshot.by_type(DriftType::Database) {
                let (source, target) = (snapshot.id_of(api), snapshot.id_of(db));
                if !snapshot.pair_allowed(source, target) {
                    continue;
                }
                let matched = db.changes.iter().find_map(|change| {
                    let upper = change.to_uppercase();
                    ops.iter().find(|op| upper.contains(**op)).copied()
                });
                if let Some(op) = matched {
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "operation_alignment".to_string(),
                        confidence: 0.6,
                        evidence: vec![Evidence::reason(format!(
                            "{} aligns with {} in the migration",
                            method, op
                        ))],
                    });
                }
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use driftgate_core::{expand_findings, DriftFinding};
    use driftgate_parser::CodeIndex;

    fn snapshot(findings: Vec<DriftFinding>) -> Snapshot {
        Snapshot::new(
            expand_findings(findings),
            Arc::new(CodeIndex::default()),
            2,
        )
    }

    #[test]
    fn delete_verb_aligns_with_drop() {
        let mut api = DriftFinding::new(DriftType::Api, "openapi.yaml");
        api.endpoints = vec!["DELETE:/v1/users/{id}".into()];
        let mut db = DriftFinding::new(DriftType::Database, "m.sql");
        db.entities = vec!["users".into()];
        db.changes = vec!["DROP TABLE: users".into()];

        let signals = OperationStrategy.run(&snapshot(vec![api, db])).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "operation_alignment");
    }

    #[test]
    fn get_verb_does_not_align_with_ddl() {
        let mut api = DriftFinding::new(DriftType::Api, "openapi.yaml");
        api.endpoints = vec!["GET:/v1/users".into()];
        let mut db = DriftFinding::new(DriftType::Database, "m.sql");
        db.entities = vec!["users".into()];
        db.changes = vec!["DROP TABLE: users".into()];

        assert!(OperationStrategy
            .run(&snapshot(vec![api, db]))
            .unwrap()
            .is_empty());
    }
}
