//! Signal aggregation: per pair, merge signals by strategy, weight them into
//! a final score, and dedupe evidence.

use std::collections::BTreeMap;

use driftgate_core::{pair_key, Correlation, Evidence, Signal};

const MAX_EVIDENCE: usize = 5;

/// Strategy name reserved for user-defined rules.
pub const EXPLICIT_STRATEGY: &str = "explicit";

fn has_location(signal: &Signal) -> bool {
    signal
        .evidence
        .iter()
        .any(|e| e.file.is_some() && e.line.is_some())
}

fn evidence_key(evidence: &Evidence) -> String {
    format!(
        "{}|{}|{}",
        evidence.reason.to_lowercase(),
        evidence.file.as_deref().unwrap_or(""),
        evidence.line.map(|l| l.to_string()).unwrap_or_default()
    )
}

/// Merge all signals into one correlation per artifact pair.
///
/// `weights` maps strategy name to its configured weight; the explicit
/// strategy always weighs 1.0 and forces `final_score = 1.0`.
pub fn aggregate(signals: Vec<Signal>, weights: &BTreeMap<String, f64>) -> Vec<Correlation> {
    let mut by_pair: BTreeMap<String, Vec<Signal>> = BTreeMap::new();
    for signal in signals {
        by_pair
            .entry(pair_key(&signal.source, &signal.target))
            .or_default()
            .push(signal);
    }

    let mut correlations = Vec::new();
    for (_, pair_signals) in by_pair {
        // Max-confidence signal per strategy; ties prefer file+line evidence.
        let mut per_strategy: BTreeMap<String, Signal> = BTreeMap::new();
        for signal in pair_signals {
            let replace = match per_strategy.get(&signal.strategy) {
                None => true,
                Some(existing) => {
                    signal.confidence > existing.confidence
                        || (signal.confidence == existing.confidence
                            && has_location(&signal)
                            && !has_location(existing))
                }
            };
            if replace {
                per_strategy.insert(signal.strategy.clone(), signal);
            }
        }

        let user_defined = per_strategy.contains_key(EXPLICIT_STRATEGY);
        let mut scores = BTreeMap::new();
        let mut strategy_weights = BTreeMap::new();
        let mut relationships: Vec<String> = Vec::new();
        let mut evidence: Vec<Evidence> = Vec::new();
        let mut seen_evidence: Vec<String> = Vec::new();

        // Orientation is canonical: smaller artifact ID first.
        let any = per_strategy.values().next().expect("non-empty pair group");
        let (source_id, target_id) = if any.source <= any.target {
            (any.source.clone(), any.target.clone())
        } else {
            (any.target.clone(), any.source.clone())
        };

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (strategy, signal) in &per_strategy {
            let weight = if strategy == EXPLICIT_STRATEGY {
                1.0
            } else {
                weights.get(strategy).copied().unwrap_or(1.0)
            };
            scores.insert(strategy.clone(), signal.confidence);
            strategy_weights.insert(strategy.clone(), weight);
            weighted_sum += signal.confidence * weight;
            weight_total += weight;

            if !relationships.contains(&signal.relationship) {
                relationships.push(signal.relationship.clone());
            }
            for item in &signal.evidence {
                let key = evidence_key(item);
                if !seen_evidence.contains(&key) && evidence.len() < MAX_EVIDENCE {
                    seen_evidence.push(key);
                    evidence.push(item.clone());
                }
            }
        }

        let final_score = if user_defined {
            1.0
        } else if weight_total > 0.0 {
            (weighted_sum / weight_total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        relationships.sort();
        correlations.push(Correlation {
            source_id,
            target_id,
            relationship: relationships.join("|"),
            scores,
            weights: strategy_weights,
            final_score,
            evidence,
            user_defined,
        });
    }
    correlations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(strategy: &str, confidence: f64) -> Signal {
        Signal {
            source: "api:GET:/users".into(),
            target: "db:table:users".into(),
            strategy: strategy.into(),
            relationship: if strategy == "operation" {
                "operation_alignment".into()
            } else {
                "api_uses_table".into()
            },
            confidence,
            evidence: vec![Evidence::reason(format!("{} evidence", strategy))],
        }
    }

    fn weights() -> BTreeMap<String, f64> {
        BTreeMap::from([("entity".to_string(), 1.0), ("operation".to_string(), 0.5)])
    }

    #[test]
    fn weighted_average_of_two_strategies() {
        let correlations = aggregate(
            vec![signal("entity", 0.8), signal("operation", 0.6)],
            &weights(),
        );
        assert_eq!(correlations.len(), 1);
        let c = &correlations[0];
        // (0.8 * 1.0 + 0.6 * 0.5) / 1.5
        assert!((c.final_score - 0.7333333333).abs() < 1e-6);
        assert_eq!(c.relationship, "api_uses_table|operation_alignment");
        assert!(!c.user_defined);
    }

    #[test]
    fn explicit_strategy_forces_full_score() {
        let mut explicit = signal(EXPLICIT_STRATEGY, 1.0);
        explicit.relationship = "depends_on".into();
        let correlations = aggregate(vec![signal("entity", 0.4), explicit], &weights());
        let c = &correlations[0];
        assert_eq!(c.final_score, 1.0);
        assert!(c.user_defined);
    }

    #[test]
    fn per_strategy_max_wins_with_location_tiebreak() {
        let weak = signal("entity", 0.9);
        let mut strong = signal("entity", 0.9);
        strong.evidence = vec![Evidence::at("located", "src/a.js", 3)];
        let correlations = aggregate(vec![weak, strong], &weights());
        let c = &correlations[0];
        assert_eq!(c.scores["entity"], 0.9);
        assert!(c.evidence.iter().any(|e| e.file.is_some()));
    }

    #[test]
    fn reversed_orientation_merges_into_one_pair() {
        let a = signal("entity", 0.8);
        let mut b = signal("operation", 0.6);
        std::mem::swap(&mut b.source, &mut b.target);
        let correlations = aggregate(vec![a, b], &weights());
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].source_id, "api:GET:/users");
        assert_eq!(correlations[0].target_id, "db:table:users");
    }

    #[test]
    fn evidence_is_deduped_case_insensitively_and_capped() {
        let mut signals = Vec::new();
        for i in 0..8 {
            let mut s = signal("entity", 0.5 + i as f64 * 0.01);
            s.evidence = vec![
                Evidence::reason("Shared Reason"),
                Evidence::reason(format!("unique {}", i)),
            ];
            signals.push(s);
        }
        // Only the max-confidence signal per strategy survives, so evidence
        // comes from one signal here.
        let correlations = aggregate(signals, &weights());
        assert!(correlations[0].evidence.len() <= MAX_EVIDENCE);
    }
}
