//! Same-directory co-change signal. Cheap and noisy; disabled by default.

use driftgate_core::{Evidence, Result, Signal};

use crate::snapshot::Snapshot;

use super::CorrelationStrategy;

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub struct TemporalStrategy;

impl CorrelationStrategy for TemporalStrategy {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn default_weight(&self) -> f64 {
        0.3
    }

    fn default_enabled(&self) -> bool {
        false
    }

    fn run(&self, snapshot: &Snapshot) -> Result<Vec<Signal>> {
        let mut signals = Vec::new();
        for (i, a) in snapshot.findings.iter().enumerate() {
            for b in snapshot.findings.iter().skip(i + 1) {
                let (source, target) = (snapshot.id_of(a), snapshot.id_of(b));
                if source == target || !snapshot.pair_allowed(source, target) {
                    continue;
                }
                if parent_dir(&a.file) == parent_dir(&b.file) {
                    signals.push(Signal {
                        source: source.to_string(),
                        target: target.to_string(),
                        strategy: self.name().to_string(),
                        relationship: "temporal_correlation".to_string(),
                        confidence: 0.3,
                        evidence: vec![Evidence::reason(format!(
                            "changed in the same directory '{}'",
                            parent_dir(&a.file)
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

    use driftgate_core::{expand_findings, DriftFinding, DriftType};
    use driftgate_parser::CodeIndex;

    #[test]
    fn same_directory_pairs_at_fixed_confidence() {
        let mut a = DriftFinding::new(DriftType::Database, "db/001.sql");
        a.entities = vec!["users".into()];
        let mut b = DriftFinding::new(DriftType::Database, "db/002.sql");
        b.entities = vec!["orders".into()];
        let c = DriftFinding::new(DriftType::Configuration, "config/app.yaml");

        let snap = Snapshot::new(
            expand_findings(vec![a, b, c]),
            Arc::new(CodeIndex::default()),
            2,
        );
        let signals = TemporalStrategy.run(&snap).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].confidence, 0.3);
    }
}
