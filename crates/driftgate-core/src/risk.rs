//! Centralized risk scoring: maps change indicators and property patterns to
//! a severity, and owns the critical-security safety rail that no later
//! stage may overrule.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// Indicators that force `high` on substring match (case-insensitive).
pub const HIGH_INDICATORS: &[&str] = &[
    "DROP TABLE",
    "DROP COLUMN",
    "TRUNCATE TABLE",
    "DROP CONSTRAINT",
    "COLUMN LOSS",
    "TABLE RENAME",
    "API_DELETION",
    "BREAKING_CHANGE",
    "SECURITY_GROUP_DELETION",
    "RESOURCE_DELETION",
    "SECRET_KEY_ADDED",
    "SECRET_KEY_REMOVED",
    "MAJOR_VERSION_BUMP",
    "SECURITY_VULNERABILITY",
    "CVE_DETECTED",
    "INTEGRITY_MISMATCH",
    "TRANSITIVE_MAJOR_BUMP",
    "MALICIOUS_PACKAGE",
];

/// Indicators that force at least `medium`.
pub const MEDIUM_INDICATORS: &[&str] = &[
    "TYPE NARROWING",
    "NOT NULL",
    "REQUIRED",
    "COLUMN RENAME",
    "ADD CONSTRAINT",
    "DROP POLICY",
    "ALTER POLICY",
    "API_EXPANSION",
    "SECURITY_GROUP_CHANGE",
    "COST_INCREASE",
    "FEATURE_FLAG_",
    "CONTAINER_REMOVED",
    "DEPENDENCY_REMOVED",
    "MINOR_VERSION_BUMP",
    "LICENSE_CHANGE",
    "DEPRECATED_PACKAGE",
    "TRANSITIVE_DEPENDENCIES_CHANGED",
    "NEW_LOCK_FILE",
    "LARGE_INSTANCE_TYPE",
    "DELETION_PROTECTION_DISABLED",
    "SKIP_FINAL_SNAPSHOT",
    "PRIVILEGED_CONTAINER",
    "HOST_NETWORK",
    "SERVICE_TYPE_LOADBALANCER",
    "REPLICAS_ZERO",
    "CONTAINER_NO_RESOURCE",
];

/// Property-level patterns that force `high`. The modification patterns are
/// arrow-aware so only the unsafe direction of a transition trips them.
static HIGH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)cidr.*0\.0\.0\.0/0",
        r"(?i)deletion.?policy.*(?:→|->).*delete",
        r"(?i)publicly\w*\s*=\s*true",
        r"(?i)publicly.*(?:→|->).*true",
        r"(?i)encrypt\w*\s*=\s*false",
        r"(?i)encrypt\w*.*(?:→|->).*false",
        r"(?i)ssl\w*\s*=\s*false",
        r"(?i)ssl\w*.*(?:→|->).*false",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Property-level patterns that force at least `medium`.
static MEDIUM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)PROPERTY_(MODIFIED|ADDED|REMOVED).*(port|timeout|size)",
        r"(?i)(ingress|egress)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Tokens whose presence makes a finding critical-security: such findings
/// cannot be downgraded and are forced to `high` during reassessment.
pub const CRITICAL_SECURITY_TOKENS: &[&str] = &[
    "SECURITY_VULNERABILITY",
    "CVE_DETECTED",
    "CVE-",
    "DROP TABLE",
    "DROP COLUMN",
    "TRUNCATE TABLE",
    "SECURITY_GROUP_DELETION",
    "SECRET_KEY_ADDED",
    "SECRET_KEY_REMOVED",
    "INTEGRITY_MISMATCH",
    "MALICIOUS_PACKAGE",
];

/// Tokens that make an artifact pair critical for the ignore-rule rail.
pub const CRITICAL_PAIR_TOKENS: &[&str] =
    &["DROP TABLE", "DROP COLUMN", "TRUNCATE", "CVE", "0.0.0.0/0"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub severity: Severity,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideInfo {
    pub applied: bool,
    pub reason: String,
    pub original_severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Scoring output for a whole assessment, carrying the merge-gate flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub severity: Severity,
    pub reasoning: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_info: Option<OverrideInfo>,
    pub allow_merge: bool,
}

impl RiskAssessment {
    pub fn from_score(score: RiskScore) -> Self {
        Self {
            allow_merge: score.severity != Severity::High,
            severity: score.severity,
            reasoning: score.reasoning,
            override_info: None,
        }
    }
}

/// Classify a set of change indicators. Highest matching tier wins; any
/// non-empty input scores at least `low`.
pub fn score_changes(changes: &[String], kind: &str) -> RiskScore {
    if changes.is_empty() {
        return RiskScore {
            severity: Severity::Low,
            reasoning: Vec::new(),
        };
    }

    let mut reasoning = Vec::new();
    let mut severity = Severity::Low;

    for change in changes {
        let upper = change.to_uppercase();
        if let Some(ind) = HIGH_INDICATORS.iter().find(|i| upper.contains(**i)) {
            reasoning.push(format!("{} change '{}' matches high-risk indicator '{}'", kind, change, ind));
            severity = Severity::High;
        } else if let Some(re) = HIGH_PATTERNS.iter().find(|re| re.is_match(change)) {
            reasoning.push(format!(
                "{} change '{}' matches high-risk pattern '{}'",
                kind, change, re
            ));
            severity = Severity::High;
        }
    }
    if severity == Severity::High {
        return RiskScore { severity, reasoning };
    }

    for change in changes {
        let upper = change.to_uppercase();
        if let Some(ind) = MEDIUM_INDICATORS.iter().find(|i| upper.contains(**i)) {
            reasoning.push(format!(
                "{} change '{}' matches medium-risk indicator '{}'",
                kind, change, ind
            ));
            severity = Severity::Medium;
        } else if let Some(re) = MEDIUM_PATTERNS.iter().find(|re| re.is_match(change)) {
            reasoning.push(format!(
                "{} change '{}' matches medium-risk pattern '{}'",
                kind, change, re
            ));
            severity = Severity::Medium;
        }
    }

    RiskScore { severity, reasoning }
}

/// Attach an override to an assessment. An empty or whitespace-only reason
/// is a no-op and returns the assessment unchanged.
pub fn apply_override(assessment: RiskAssessment, reason: Option<&str>) -> RiskAssessment {
    let reason = match reason {
        Some(r) if !r.trim().is_empty() => r.trim().to_string(),
        _ => return assessment,
    };
    let original = assessment.severity;
    RiskAssessment {
        override_info: Some(OverrideInfo {
            applied: true,
            reason,
            original_severity: original,
            timestamp: Utc::now(),
        }),
        allow_merge: true,
        ..assessment
    }
}

/// The critical-security safety rail: `true` when any change token carries a
/// critical-security indicator.
pub fn is_critical(changes: &[String]) -> bool {
    changes.iter().any(|c| {
        let upper = c.to_uppercase();
        CRITICAL_SECURITY_TOKENS.iter().any(|t| upper.contains(t))
    })
}

/// The ignore-rule rail: `true` when any change token on either side of a
/// pair carries a critical-pair indicator.
pub fn is_critical_pair(changes_a: &[String], changes_b: &[String]) -> bool {
    let hit = |changes: &[String]| {
        changes.iter().any(|c| {
            let upper = c.to_uppercase();
            CRITICAL_PAIR_TOKENS.iter().any(|t| upper.contains(t))
        })
    };
    hit(changes_a) || hit(changes_b)
}
