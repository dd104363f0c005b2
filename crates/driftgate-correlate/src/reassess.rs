//! Severity reassessment: the cascade feedback from correlations into
//! finding severity, bounded by the critical-security safety rail.

use std::collections::HashSet;

use tracing::debug;

use driftgate_core::risk::is_critical;
use driftgate_core::{Correlation, CorrelationImpact, DriftConfig, DriftFinding, Severity};

/// Mutate expanded findings in place: enforce the safety rail, count links,
/// and apply the upgrade ladder.
pub fn reassess(findings: &mut [DriftFinding], correlations: &[Correlation], config: &DriftConfig) {
    let thresholds = &config.correlation.thresholds;

    for finding in findings.iter_mut() {
        let Some(id) = finding.artifact_id.clone() else {
            continue;
        };
        let involved: Vec<&Correlation> = correlations
            .iter()
            .filter(|c| c.other_end(&id).is_some())
            .collect();

        let hard: Vec<&&Correlation> = involved
            .iter()
            .filter(|c| c.final_score >= thresholds.block_min)
            .collect();
        let soft = involved
            .iter()
            .filter(|c| {
                c.final_score >= thresholds.correlate_min && c.final_score < thresholds.block_min
            })
            .count();
        let cascade: HashSet<&str> = hard
            .iter()
            .filter_map(|c| c.other_end(&id))
            .collect();
        let cascade = cascade.len();
        let user_links = involved.iter().filter(|c| c.user_defined).count();

        let critical = is_critical(&finding.changes);
        if critical {
            if finding.severity != Severity::High {
                finding.severity = Severity::High;
                finding
                    .reasoning
                    .push("Critical security indicator; severity enforced to high".to_string());
            }
        } else {
            let before = finding.severity;
            // User-defined correlations upgrade harder than inferred ones.
            let after = if user_links >= 2 && before == Severity::Medium {
                Severity::High
            } else if user_links >= 1 && before == Severity::Low {
                Severity::Medium
            } else if cascade >= 3 && before == Severity::Medium {
                Severity::High
            } else if cascade >= 2 && before == Severity::Low {
                Severity::Medium
            } else if hard.len() >= 4 && before != Severity::High {
                Severity::High
            } else {
                before
            };
            if after != before {
                finding.severity = after;
                finding.reasoning.push(format!(
                    "Severity upgraded to {}: {} hard link(s), {} affected component(s)",
                    after,
                    hard.len(),
                    cascade
                ));
            }
        }

        finding.correlation_impact = Some(CorrelationImpact {
            hard: hard.len(),
            soft,
            cascade,
            correlations: involved.len(),
        });
    }
    debug!(findings = findings.len(), "severity reassessment complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftgate_core::DriftType;
    use std::collections::BTreeMap;

    fn finding(id: &str, severity: Severity, changes: &[&str]) -> DriftFinding {
        let mut f = DriftFinding::new(DriftType::Api, "f");
        f.severity = severity;
        f.changes = changes.iter().map(|s| s.to_string()).collect();
        f.artifact_id = Some(id.to_string());
        f
    }

    fn correlation(source: &str, target: &str, score: f64, user: bool) -> Correlation {
        Correlation {
            source_id: source.to_string(),
            target_id: target.to_string(),
            relationship: "api_uses_table".into(),
            scores: BTreeMap::new(),
            weights: BTreeMap::new(),
            final_score: score,
            evidence: vec![],
            user_defined: user,
        }
    }

    #[test]
    fn cascade_of_three_upgrades_medium_to_high() {
        let mut findings = vec![finding("a", Severity::Medium, &["ADD CONSTRAINT: fk"])];
        let correlations = vec![
            correlation("a", "b", 0.9, false),
            correlation("a", "c", 0.85, false),
            correlation("d", "a", 0.95, false),
        ];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::High);
        let impact = findings[0].correlation_impact.clone().unwrap();
        assert_eq!(impact.hard, 3);
        assert_eq!(impact.cascade, 3);
    }

    #[test]
    fn cascade_of_two_upgrades_low_to_medium() {
        let mut findings = vec![finding("a", Severity::Low, &["CONFIG_KEY_ADDED: x"])];
        let correlations = vec![
            correlation("a", "b", 0.9, false),
            correlation("a", "c", 0.85, false),
        ];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn soft_links_do_not_upgrade() {
        let mut findings = vec![finding("a", Severity::Low, &["CONFIG_KEY_ADDED: x"])];
        let correlations = vec![
            correlation("a", "b", 0.6, false),
            correlation("a", "c", 0.7, false),
        ];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::Low);
        let impact = findings[0].correlation_impact.clone().unwrap();
        assert_eq!(impact.soft, 2);
        assert_eq!(impact.hard, 0);
    }

    #[test]
    fn single_user_rule_upgrades_low() {
        let mut findings = vec![finding("a", Severity::Low, &["CONFIG_KEY_ADDED: x"])];
        let correlations = vec![correlation("a", "b", 1.0, true)];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn two_user_rules_upgrade_medium() {
        let mut findings = vec![finding("a", Severity::Medium, &["ADD CONSTRAINT: fk"])];
        let correlations = vec![
            correlation("a", "b", 1.0, true),
            correlation("a", "c", 1.0, true),
        ];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn critical_finding_is_forced_high_and_never_downgraded() {
        let mut findings = vec![finding("a", Severity::Medium, &["DROP TABLE: users"])];
        reassess(&mut findings, &[], &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn already_high_critical_finding_is_untouched() {
        let mut findings = vec![finding("a", Severity::High, &["DROP TABLE: users"])];
        let correlations = vec![correlation("a", "b", 0.9, false)];
        reassess(&mut findings, &correlations, &DriftConfig::default());
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0]
            .reasoning
            .iter()
            .all(|r| !r.contains("enforced")));
    }
}
