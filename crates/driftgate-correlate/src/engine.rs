//! The correlation engine: user rules, budget-aware candidate selection,
//! strategy execution, and aggregation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use driftgate_core::risk::is_critical_pair;
use driftgate_core::{
    pair_key, resolve_token, Budget, Correlation, DriftConfig, DriftFinding, Evidence, Signal,
};
use driftgate_parser::CodeIndex;

use crate::aggregate::{aggregate, EXPLICIT_STRATEGY};
use crate::snapshot::Snapshot;
use crate::strategies::{default_strategies, CorrelationStrategy};

pub struct CorrelationEngine {
    strategies: Vec<Box<dyn CorrelationStrategy>>,
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self {
            strategies: default_strategies(),
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn CorrelationStrategy>>) -> Self {
        Self { strategies }
    }

    fn enabled(&self, config: &DriftConfig) -> Vec<&dyn CorrelationStrategy> {
        self.strategies
            .iter()
            .filter(|s| {
                config
                    .correlation
                    .strategy(s.name())
                    .enabled
                    .unwrap_or_else(|| s.default_enabled())
            })
            .map(|s| s.as_ref())
            .collect()
    }

    fn budget_of(&self, strategy: &dyn CorrelationStrategy, config: &DriftConfig) -> Budget {
        config
            .correlation
            .strategy(strategy.name())
            .budget
            .unwrap_or_else(|| strategy.default_budget())
    }

    fn weight_map(&self, config: &DriftConfig) -> BTreeMap<String, f64> {
        self.strategies
            .iter()
            .map(|s| {
                let weight = config
                    .correlation
                    .strategy(s.name())
                    .weight
                    .unwrap_or_else(|| s.default_weight());
                (s.name().to_string(), weight)
            })
            .collect()
    }

    /// Run the full correlation pipeline over expanded findings.
    pub fn correlate(
        &self,
        findings: &[DriftFinding],
        code_index: Arc<CodeIndex>,
        config: &DriftConfig,
    ) -> Vec<Correlation> {
        let ids: Vec<String> = findings
            .iter()
            .filter_map(|f| f.artifact_id.clone())
            .collect();
        let changes_by_id: HashMap<&str, &DriftFinding> = findings
            .iter()
            .filter_map(|f| f.artifact_id.as_deref().map(|id| (id, f)))
            .collect();

        // Pairs suppressed by ignore rules; confined to this run.
        let mut processed_pairs: HashSet<String> = HashSet::new();
        let mut explicit_signals: Vec<Signal> = Vec::new();
        let mut rule_pairs: HashSet<String> = HashSet::new();

        for rule in &config.correlation.rules {
            let sources = resolve_token(&rule.source, &ids);
            let targets = resolve_token(&rule.target, &ids);
            if sources.is_empty() || targets.is_empty() {
                warn!(
                    rule_type = %rule.rule_type,
                    source = %rule.source,
                    target = %rule.target,
                    "user rule matched no artifacts; rule is inert"
                );
                continue;
            }
            for source in &sources {
                for target in &targets {
                    if source == target {
                        continue;
                    }
                    let key = pair_key(source, target);
                    if rule.is_ignore() {
                        let critical = is_critical_pair(
                            changes_by_id
                                .get(source.as_str())
                                .map(|f| f.changes.as_slice())
                                .unwrap_or(&[]),
                            changes_by_id
                                .get(target.as_str())
                                .map(|f| f.changes.as_slice())
                                .unwrap_or(&[]),
                        );
                        if critical {
                            warn!(
                                source = %source,
                                target = %target,
                                "ignore rule suppressed: pair carries critical indicators"
                            );
                            continue;
                        }
                        processed_pairs.insert(key);
                    } else {
                        rule_pairs.insert(key);
                        explicit_signals.push(Signal {
                            source: source.clone(),
                            target: target.clone(),
                            strategy: EXPLICIT_STRATEGY.to_string(),
                            relationship: rule.rule_type.clone(),
                            confidence: 1.0,
                            evidence: vec![Evidence::reason(
                                rule.reason
                                    .clone()
                                    .or_else(|| rule.description.clone())
                                    .unwrap_or_else(|| {
                                        format!("user-defined rule: {}", rule.rule_type)
                                    }),
                            )],
                        });
                    }
                }
            }
        }

        let mut snapshot = Snapshot::new(
            findings.to_vec(),
            code_index,
            config.call_graph_depth.max(1),
        );
        let enabled = self.enabled(config);

        // Low-budget strategies sweep the full artifact cross-product.
        let mut low_signals: Vec<Signal> = Vec::new();
        for strategy in &enabled {
            if self.budget_of(*strategy, config) != Budget::Low {
                continue;
            }
            match strategy.run(&snapshot) {
                Ok(signals) => low_signals.extend(signals),
                Err(error) => {
                    warn!(strategy = strategy.name(), %error, "strategy failed; yielding no signals")
                }
            }
        }

        // Candidate selection: per source, the top-K signals above the
        // correlation floor; capped overall, user-rule pairs always in.
        let thresholds = &config.correlation.thresholds;
        let limits = &config.correlation.limits;
        let mut by_source: BTreeMap<&str, Vec<&Signal>> = BTreeMap::new();
        for signal in low_signals
            .iter()
            .filter(|s| s.confidence >= thresholds.correlate_min)
        {
            by_source.entry(signal.source.as_str()).or_default().push(signal);
        }
        let mut candidate_keys: Vec<(String, f64)> = Vec::new();
        for signals in by_source.values_mut() {
            signals.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            for signal in signals.iter().take(limits.top_k_per_source) {
                let key = pair_key(&signal.source, &signal.target);
                if !candidate_keys.iter().any(|(k, _)| k == &key) {
                    candidate_keys.push((key, signal.confidence));
                }
            }
        }
        candidate_keys.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidate_keys.truncate(limits.max_pairs_high_cost);
        let mut candidates: HashSet<String> =
            candidate_keys.into_iter().map(|(k, _)| k).collect();
        candidates.extend(rule_pairs);

        debug!(candidates = candidates.len(), "candidate pairs selected");
        snapshot.candidates = Some(candidates);

        // Medium- and high-budget strategies only see candidate pairs.
        let mut all_signals = low_signals;
        for strategy in &enabled {
            if self.budget_of(*strategy, config) == Budget::Low {
                continue;
            }
            match strategy.run(&snapshot) {
                Ok(signals) => all_signals.extend(signals),
                Err(error) => {
                    warn!(strategy = strategy.name(), %error, "strategy failed; yielding no signals")
                }
            }
        }
        all_signals.extend(explicit_signals);

        all_signals.retain(|s| !processed_pairs.contains(&pair_key(&s.source, &s.target)));

        let mut correlations = aggregate(all_signals, &self.weight_map(config));
        correlations.sort_by(|a, b| {
            a.source_id
                .cmp(&b.source_id)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        correlations
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftgate_core::{expand_findings, DriftType, UserRule};

    fn api(endpoint: &str) -> DriftFinding {
        let mut f = DriftFinding::new(DriftType::Api, "openapi.yaml");
        f.endpoints = vec![endpoint.to_string()];
        f
    }

    fn db(table: &str, changes: &[&str]) -> DriftFinding {
        let mut f = DriftFinding::new(DriftType::Database, "m.sql");
        f.entities = vec![table.to_string()];
        f.changes = changes.iter().map(|s| s.to_string()).collect();
        f
    }

    fn run(findings: Vec<DriftFinding>, config: &DriftConfig) -> Vec<Correlation> {
        CorrelationEngine::new().correlate(
            &expand_findings(findings),
            Arc::new(CodeIndex::default()),
            config,
        )
    }

    #[test]
    fn entity_match_produces_a_correlation() {
        let config = DriftConfig::default();
        let correlations = run(
            vec![api("GET:/v1/users/{id}"), db("users", &["DROP TABLE: users"])],
            &config,
        );
        assert_eq!(correlations.len(), 1);
        assert!(correlations[0].scores.contains_key("entity"));
    }

    #[test]
    fn ignore_rule_suppresses_benign_pair() {
        let mut config = DriftConfig::default();
        config.correlation.rules.push(UserRule {
            rule_type: "ignore".into(),
            source: "api:*".into(),
            target: "db:*".into(),
            reason: None,
            description: None,
        });
        let correlations = run(
            vec![api("GET:/v1/users/{id}"), db("users", &["ADD CONSTRAINT: fk"])],
            &config,
        );
        assert!(correlations.is_empty());
    }

    #[test]
    fn ignore_rule_cannot_suppress_critical_pair() {
        let mut config = DriftConfig::default();
        config.correlation.rules.push(UserRule {
            rule_type: "ignore".into(),
            source: "api:*".into(),
            target: "db:*".into(),
            reason: None,
            description: None,
        });
        let correlations = run(
            vec![api("GET:/v1/users/{id}"), db("users", &["DROP TABLE: users"])],
            &config,
        );
        assert_eq!(correlations.len(), 1);
    }

    #[test]
    fn explicit_rule_forces_full_confidence() {
        let mut config = DriftConfig::default();
        config.correlation.rules.push(UserRule {
            rule_type: "depends_on".into(),
            source: "api:GET:/v1/invoices".into(),
            target: "db:table:payments".into(),
            reason: Some("billing flow".into()),
            description: None,
        });
        let correlations = run(
            vec![api("GET:/v1/invoices"), db("payments", &["NOT NULL: payments.amount"])],
            &config,
        );
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].final_score, 1.0);
        assert!(correlations[0].user_defined);
    }

    #[test]
    fn unresolvable_rule_is_inert() {
        let mut config = DriftConfig::default();
        config.correlation.rules.push(UserRule {
            rule_type: "depends_on".into(),
            source: "api:GET:/nope".into(),
            target: "db:table:users".into(),
            reason: None,
            description: None,
        });
        let correlations = run(
            vec![api("GET:/v1/users/{id}"), db("users", &["DROP TABLE: users"])],
            &config,
        );
        // Only the entity/operation result; nothing exploded.
        assert_eq!(correlations.len(), 1);
        assert!(!correlations[0].user_defined);
    }

    #[test]
    fn disabled_strategy_contributes_nothing() {
        let mut config = DriftConfig::default();
        config
            .correlation
            .strategies
            .insert("entity".into(), driftgate_core::StrategySettings {
                enabled: Some(false),
                budget: None,
                weight: None,
            });
        let correlations = run(
            vec![api("GET:/v1/users/{id}"), db("users", &["ADD CONSTRAINT: fk"])],
            &config,
        );
        assert!(correlations.is_empty());
    }
}
