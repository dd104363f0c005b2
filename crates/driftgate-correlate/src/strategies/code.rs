//! Code-analysis correlation: matches an api finding's handler to a db
//! finding's table through the shallow call graph, with file-and-line
//! evidence from the actual call site.

use driftgate_core::names;
use driftgate_core::{DriftType, Evidence, Result, Signal};
use driftgate_parser::Handler;

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

fn hop_confidence(hops: usize, inferred: bool) -> f64 {
    let base = match hops {
        0 => 0.90,
        1 => 0.80,
        _ => 0.70,
    };
    if inferred {
        base - 0.05
    } else {
        base
    }
}

fn handler_matches(handler: &Handler, endpoint: &str) -> bool {
    handler.endpoint().eq_ignore_ascii_case(endpoint)
}

pub struct CodeStrategy;

impl CorrelationStrategy for CodeStrategy {
    fn name(&self) -> &'static str {
        "code"
    }

    fn default_budget(&self) -> driftgate_core::Budget {
        driftgate_core::Budget::High
    }

    fn default_weight(&self) -> f64 {
        1.0
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let index = snapshot.code_index.clone();
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let mut signals = Vec::new();
        for api in snapshot.by_type(DriftType::Api) {
            let Some(endpoint) = api.endpoints.first() else {
                continue;
            };
            let handlers: Vec<&Handler> = index
                .handlers()
                .filter(|h| handler_matches(h, endpoint))
                .collect();
            if handlers.is_empty() {
                continue;
            }

            for db in snapshot.by_type(DriftType::Database) {
                let Some(table) = db.entities.first() else {
                    continue;
                };
                let (source, target) = (snapshot.id_of(api), snapshot.id_of(db));
                if !snapshot.pair_allowed(source, target) {
                    continue;
                }

                let mut best: Option<Signal> = None;
                for handler in &handlers {
                    for (db_ref, hops) in index.accesses(handler, snapshot.call_graph_depth) {
                        if names::names_match(&db_ref.table, table).is_none() {
                            continue;
                        }
                        let confidence = hop_confidence(hops, db_ref.inferred);
                        let candidate = Signal {
                            source: source.to_string(),
                            target: target.to_string(),
                            strategy: self.name().to_string(),
                            relationship: "api_uses_table".to_string(),
                            confidence,
                            evidence: vec![Evidence::at(
                                format!(
                                    "{} access to table '{}' reachable from handler {} ({} hop{})",
                                    db_ref.orm,
                                    db_ref.table,
                                    handler.symbol,
                                    hops,
                                    if hops == 1 { "" } else { "s" }
                                ),
                                db_ref.file.clone(),
                                db_ref.line,
                            )],
                        };
                        if best
                            .as_ref()
                            .map(|b| candidate.confidence > b.confidence)
                            .unwrap_or(true)
                        {
                            best = Some(candidate);
                        }
                    }
                }
                signals.extend(best);
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use driftgate_core::{expand_findings, DriftFinding};
    use driftgate_parser::{CodeIndex, DbRef, FileAnalysis};

    fn index_with_handler_and_ref() -> CodeIndex {
        let mut files = BTreeMap::new();
        files.insert(
            "src/routes/users.js".to_string(),
            Arc::new(FileAnalysis {
                hash: "h".into(),
                handlers: vec![Handler {
                    method: "GET".into(),
                    path: "/v1/users/:id".into(),
                    file: "src/routes/users.js".into(),
                    symbol: "getUserById".into(),
                    line: 5,
                }],
                db_refs: vec![DbRef {
                    orm: "prisma".into(),
                    table: "users".into(),
                    op: Some("SELECT".into()),
                    file: "src/routes/users.js".into(),
                    symbol: "getUserById".into(),
                    line: 7,
                    inferred: true,
                }],
                calls: vec![],
                imports: vec![],
            }),
        );
        CodeIndex { files }
    }

    #[test]
    fn same_function_prisma_access_scores_085() {
        let mut api = DriftFinding::new(DriftType::Api, "src/routes/users.js");
        api.endpoints = vec!["GET:/v1/users/{id}".into()];
        let mut db = DriftFinding::new(DriftType::Database, "m.sql");
        db.entities = vec!["users".into()];
        db.changes = vec!["DROP TABLE: users".into()];

        let snap = Snapshot::new(
            expand_findings(vec![api, db]),
            Arc::new(index_with_handler_and_ref()),
            2,
        );
        let signals = CodeStrategy.run(&snap).unwrap();
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert!((signal.confidence - 0.85).abs() < 1e-9);
        assert_eq!(signal.relationship, "api_uses_table");
        let evidence = &signal.evidence[0];
        assert_eq!(evidence.file.as_deref(), Some("src/routes/users.js"));
        assert_eq!(evidence.line, Some(7));
    }

    #[test]
    fn hop_confidence_ladder() {
        assert!((hop_confidence(0, false) - 0.90).abs() < 1e-9);
        assert!((hop_confidence(1, false) - 0.80).abs() < 1e-9);
        assert!((hop_confidence(2, false) - 0.70).abs() < 1e-9);
        assert!((hop_confidence(0, true) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn unrelated_table_produces_no_signal() {
        let mut api = DriftFinding::new(DriftType::Api, "src/routes/users.js");
        api.endpoints = vec!["GET:/v1/users/{id}".into()];
        let mut db = DriftFinding::new(DriftType::Database, "m.sql");
        db.entities = vec!["payments".into()];

        let snap = Snapshot::new(
            expand_findings(vec![api, db]),
            Arc::new(index_with_handler_and_ref()),
            2,
        );
        assert!(CodeStrategy.run(&snap).unwrap().is_empty());
    }
}
