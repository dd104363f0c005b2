//! Entity matching: api endpoint path tokens against database table names,
//! through the shared name-variation rules.

use driftgate_core::names;
use driftgate_core::{DriftType, Evidence, Result, Signal};

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

/// Path segments that never name an entity.
fn is_noise_segment(segment: &str) -> bool {
    segment.is_empty()
        || segment.starts_with('{')
        || segment.starts_with(':')
        || segment.eq_ignore_ascii_case("api")
        || (segment.len() <= 3
            && segment.starts_with(['v', 'V'])
            && segment[1..].chars().all(|c| c.is_ascii_digit()))
}

/// Candidate entity tokens of an endpoint: its non-noise path segments.
pub fn endpoint_tokens(endpoint: &str) -> Vec<String> {
    let path = endpoint.split_once(':').map(|(_, p)| p).unwrap_or(endpoint);
    path.split('/')
        .filter(|s| !is_noise_segment(s))
        .map(|s| s.to_lowercase())
        .collect()
}

pub struct EntityStrategy;

impl CorrelationStrategy for EntityStrategy {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn default_weight(&self) -> f64 {
        1.0
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();
        for api in snapshot.by_type(DriftType::Api) {
            let Some(endpoint) = api.endpoints.first() else {
                continue;
            };
            let tokens = endpoint_tokens(endpoint);
            for db in snapshot.by_type(DriftType::Database) {
                let Some(table) = db.entities.first() else {
                    continue;
                };
                let (source, target) = (snapshot.id_of(api), snapshot.id_of(db));
                if !snapshot.pair_allowed(source, target) {
                    continue;
                }
                let best = tokens
                    .iter()
                    .filter_map(|t| names::names_match(t, table).map(|s| (t.clone(), s)))
                    .max_by(|a, b| a.1.total_cmp(&b.1));
                if let Some((token, similarity)) = best {
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "api_uses_table".to_string(),
                        confidence: similarity,
                        evidence: vec![Evidence::reason(format!(
                            "endpoint segment '{}' matches table '{}' (similarity {:.2})",
                            token, table, similarity
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

    fn api_finding(endpoint: &str) -> DriftFinding {
        let mut f = DriftFinding::new(DriftType::Api, "openapi.yaml");
        f.endpoints = vec![endpoint.to_string()];
        f
    }

    fn db_finding(table: &str) -> DriftFinding {
        let mut f = DriftFinding::new(DriftType::Database, "m.sql");
        f.entities = vec![table.to_string()];
        f
    }

    fn snapshot(findings: Vec<DriftFinding>) -> Snapshot {
        Snapshot::new(
            expand_findings(findings),
            Arc::new(CodeIndex::default()),
            2,
        )
    }

    #[test]
    fn endpoint_tokens_skip_params_and_versions() {
        assert_eq!(
            endpoint_tokens("GET:/v1/users/{id}"),
            vec!["users".to_string()]
        );
        assert_eq!(
            endpoint_tokens("GET:/api/user-profiles/{id}/orders"),
            vec!["user-profiles".to_string(), "orders".to_string()]
        );
    }

    #[test]
    fn exact_table_match_is_full_confidence() {
        let snap = snapshot(vec![api_finding("GET:/v1/users/{id}"), db_finding("users")]);
        let signals = EntityStrategy.run(&snap).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "api_uses_table");
        assert_eq!(signals[0].confidence, 1.0);
    }

    #[test]
    fn singular_endpoint_matches_plural_table() {
        let snap = snapshot(vec![api_finding("GET:/v2/order/{id}"), db_finding("orders")]);
        let signals = EntityStrategy.run(&snap).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].confidence, 1.0);
    }

    #[test]
    fn unrelated_names_stay_silent() {
        let snap = snapshot(vec![api_finding("GET:/v1/invoices"), db_finding("users")]);
        assert!(EntityStrategy.run(&snap).unwrap().is_empty());
    }
}
