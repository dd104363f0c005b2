use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy cost class. Low-budget strategies run on the full artifact
/// cross-product; medium/high only on candidate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "Thresholds::default_correlate_min")]
    pub correlate_min: f64,
    #[serde(default = "Thresholds::default_block_min")]
    pub block_min: f64,
}

impl Thresholds {
    fn default_correlate_min() -> f64 {
        0.55
    }

    fn default_block_min() -> f64 {
        0.80
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            correlate_min: Self::default_correlate_min(),
            block_min: Self::default_block_min(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "Limits::default_top_k_per_source")]
    pub top_k_per_source: usize,
    #[serde(default = "Limits::default_max_pairs_high_cost")]
    pub max_pairs_high_cost: usize,
}

impl Limits {
    fn default_top_k_per_source() -> usize {
        3
    }

    fn default_max_pairs_high_cost() -> usize {
        100
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            top_k_per_source: Self::default_top_k_per_source(),
            max_pairs_high_cost: Self::default_max_pairs_high_cost(),
        }
    }
}

/// A user-defined correlation rule. `type = "ignore"` suppresses a pair;
/// any other type asserts an explicit correlation at confidence 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UserRule {
    pub fn is_ignore(&self) -> bool {
        self.rule_type.eq_ignore_ascii_case("ignore")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategySettings>,
    #[serde(default)]
    pub rules: Vec<UserRule>,
}

impl CorrelationConfig {
    pub fn strategy(&self, name: &str) -> StrategySettings {
        self.strategies.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Glob selecting SQL migration files.
    pub sql_glob: String,
    /// Canonical path of the OpenAPI specification, when the repo has one.
    pub openapi_path: Option<String>,
    /// Path of the Terraform plan JSON in the change set.
    pub terraform_path: Option<String>,
    /// Glob selecting CloudFormation templates.
    pub cloudformation_glob: Option<String>,
    /// Globs selecting generic configuration files.
    pub config_globs: Vec<String>,
    /// Glob selecting the feature-flag file(s).
    pub feature_flag_glob: Option<String>,
    /// USD/month threshold above which a COST_INCREASE indicator is emitted.
    pub cost_threshold: f64,
    /// Bound on concurrent content fetches.
    pub fetch_fan_out: usize,
    /// Per-fetch deadline in seconds.
    pub fetch_timeout_secs: u64,
    /// Shallow call-graph traversal depth.
    pub call_graph_depth: usize,
    /// When set (non-empty), a high-severity report no longer blocks.
    pub override_reason: Option<String>,
    pub correlation: CorrelationConfig,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            sql_glob: "**/*.sql".to_string(),
            openapi_path: None,
            terraform_path: None,
            cloudformation_glob: None,
            config_globs: Vec::new(),
            feature_flag_glob: None,
            cost_threshold: 1000.0,
            fetch_fan_out: 8,
            fetch_timeout_secs: 30,
            call_graph_depth: 2,
            override_reason: None,
            correlation: CorrelationConfig::default(),
        }
    }
}

impl DriftConfig {
    pub fn override_reason(&self) -> Option<&str> {
        self.override_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = DriftConfig::default();
        assert_eq!(config.sql_glob, "**/*.sql");
        assert_eq!(config.cost_threshold, 1000.0);
        assert_eq!(config.fetch_fan_out, 8);
        assert_eq!(config.correlation.thresholds.correlate_min, 0.55);
        assert_eq!(config.correlation.thresholds.block_min, 0.80);
        assert_eq!(config.correlation.limits.top_k_per_source, 3);
        assert_eq!(config.correlation.limits.max_pairs_high_cost, 100);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: DriftConfig = serde_json::from_str(
            r#"{
                "openapi_path": "api/openapi.yaml",
                "correlation": {
                    "thresholds": { "block_min": 0.9 },
                    "rules": [
                        { "type": "ignore", "source": "api:*", "target": "config:*" }
                    ]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.openapi_path.as_deref(), Some("api/openapi.yaml"));
        assert_eq!(config.correlation.thresholds.block_min, 0.9);
        assert_eq!(config.correlation.thresholds.correlate_min, 0.55);
        assert!(config.correlation.rules[0].is_ignore());
        assert_eq!(config.sql_glob, "**/*.sql");
    }

    #[test]
    fn blank_override_reason_reads_as_absent() {
        let config = DriftConfig {
            override_reason: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.override_reason().is_none());
    }
}
