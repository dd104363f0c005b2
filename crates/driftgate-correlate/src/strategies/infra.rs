//! Infrastructure reach: infra resources that host APIs, back configuration,
//! or depend on each other by shared naming.

use std::collections::HashSet;

use driftgate_core::{DriftType, Evidence, Result, Signal};

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

const API_INFRA_KEYWORDS: &[&str] =
    &["api", "gateway", "function", "lambda", "endpoint", "service"];

fn name_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(String::from)
        .collect()
}

fn shares_token(a: &str, b: &str) -> Option<String> {
    let ta = name_tokens(a);
    let tb = name_tokens(b);
    ta.intersection(&tb)
        .filter(|t| !API_INFRA_KEYWORDS.contains(&t.as_str()) && *t != "aws")
        .min()
        .cloned()
}

pub struct InfrastructureStrategy;

impl CorrelationStrategy for InfrastructureStrategy {
    fn name(&self) -> &'static str {
        "infrastructure"
    }

    fn default_weight(&self) -> f64 {
        0.8
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();
        let infra: Vec<_> = snapshot.by_type(DriftType::Infrastructure).collect();

        for resource in &infra {
            let Some(address) = resource.entities.first() else {
                continue;
            };
            let source = snapshot.id_of(resource);
            let lower = address.to_lowercase();

            if API_INFRA_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                for api in snapshot.by_type(DriftType::Api) {
                    let target = snapshot.id_of(api);
                    if !snapshot.pair_allowed(source, target) {
                        continue;
                    }
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "infra_hosts_api".to_string(),
                        confidence: 0.6,
                        evidence: vec![Evidence::reason(format!(
                            "resource '{}' carries an API-serving keyword",
                            address
                        ))],
                    });
                }
            }

            for config in snapshot.by_type(DriftType::Configuration) {
                let target = snapshot.id_of(config);
                if !snapshot.pair_allowed(source, target) {
                    continue;
                }
                if let Some(token) = shares_token(address, &config.file) {
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "infra_affects_config".to_string(),
                        confidence: 0.5,
                        evidence: vec![Evidence::reason(format!(
                            "resource '{}' and '{}' share name '{}'",
                            address, config.file, token
                        ))],
                    });
                }
            }
        }

        for (i, a) in infra.iter().enumerate() {
            for b in infra.iter().skip(i + 1) {
                let (addr_a, addr_b) = match (a.entities.first(), b.entities.first()) {
                    (Some(x), Some(y)) => (x, y),
                    _ => continue,
                };
                let (source, target) = (snapshot.id_of(a), snapshot.id_of(b));
                if source == target || !snapshot.pair_allowed(source, target) {
                    continue;
                }
                if let Some(token) = shares_token(addr_a, addr_b) {
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "resource_dependency".to_string(),
                        confidence: 0.5,
                        evidence: vec![Evidence::reason(format!(
                            "resources '{}' and '{}' share name '{}'",
                            addr_a, addr_b, token
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
    fn gateway_resource_hosts_api() {
        let mut infra = DriftFinding::new(DriftType::Infrastructure, "plan.json");
        infra.entities = vec!["aws_api_gateway_rest_api.main".into()];
        let mut api = DriftFinding::new(DriftType::Api, "openapi.yaml");
        api.endpoints = vec!["GET:/users".into()];

        let signals = InfrastructureStrategy
            .run(&snapshot(vec![infra, api]))
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "infra_hosts_api");
    }

    #[test]
    fn shared_resource_name_links_infra_pairs() {
        let mut sg = DriftFinding::new(DriftType::Infrastructure, "plan.json");
        sg.entities = vec!["aws_security_group.payments".into()];
        let mut db = DriftFinding::new(DriftType::Infrastructure, "plan.json");
        db.entities = vec!["aws_db_instance.payments".into()];

        let signals = InfrastructureStrategy.run(&snapshot(vec![sg, db])).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].relationship, "resource_dependency");
    }

    #[test]
    fn unrelated_resources_stay_silent() {
        let mut sg = DriftFinding::new(DriftType::Infrastructure, "plan.json");
        sg.entities = vec!["aws_s3_bucket.logs".into()];
        let mut api = DriftFinding::new(DriftType::Api, "openapi.yaml");
        api.endpoints = vec!["GET:/users".into()];

        assert!(InfrastructureStrategy
            .run(&snapshot(vec![sg, api]))
            .unwrap()
            .is_empty());
    }
}
