use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Layer tag for a drift finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftType {
    Api,
    Database,
    Infrastructure,
    Configuration,
}

impl fmt::Display for DriftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftType::Api => "api",
            DriftType::Database => "database",
            DriftType::Infrastructure => "infrastructure",
            DriftType::Configuration => "configuration",
        };
        write!(f, "{}", s)
    }
}

/// Severity ordering matters: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    /// One level up, saturating at `High`.
    pub fn upgraded(self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium | Severity::High => Severity::High,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
}

/// One entry of the change set under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// The delta between two revisions, plus the revision handles a
/// [`ContentFetcher`](crate::traits::ContentFetcher) understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub base_ref: String,
    pub head_ref: String,
    pub files: Vec<ChangedFile>,
}

impl ChangeSet {
    pub fn file(&self, path: &str) -> Option<&ChangedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.file(path).is_some()
    }
}

/// Table rename captured by the SQL analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameInfo {
    pub from: String,
    pub to: String,
}

/// Optional per-type extensions on a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed: Option<RenameInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_analyzed: Option<usize>,
}

impl FindingMetadata {
    pub fn is_empty(&self) -> bool {
        self.cost_impact.is_none() && self.renamed.is_none() && self.tables_analyzed.is_none()
    }
}

/// Correlation-derived context attached to a finding during reassessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationImpact {
    pub hard: usize,
    pub soft: usize,
    pub cascade: usize,
    pub correlations: usize,
}

/// Uniform record produced by every analyzer.
///
/// Findings are created by analyzers, mutated only by the severity
/// reassessment stage, and are otherwise immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftFinding {
    #[serde(rename = "type")]
    pub drift_type: DriftType,
    pub file: String,
    pub severity: Severity,
    pub changes: Vec<String>,
    pub reasoning: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FindingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_impact: Option<CorrelationImpact>,
}

impl DriftFinding {
    pub fn new(drift_type: DriftType, file: impl Into<String>) -> Self {
        Self {
            drift_type,
            file: file.into(),
            severity: Severity::Low,
            changes: Vec::new(),
            reasoning: Vec::new(),
            entities: Vec::new(),
            endpoints: Vec::new(),
            metadata: None,
            artifact_id: None,
            correlation_impact: None,
        }
    }
}

/// A piece of evidence backing a correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Evidence {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(reason: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            reason: reason.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// Raw output of one correlation strategy for one artifact pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: String,
    pub target: String,
    pub strategy: String,
    pub relationship: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
}

/// Aggregated cross-layer relationship between two findings, by artifact ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub source_id: String,
    pub target_id: String,
    pub relationship: String,
    pub scores: BTreeMap<String, f64>,
    pub weights: BTreeMap<String, f64>,
    pub final_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
    pub user_defined: bool,
}

impl Correlation {
    /// The artifact on the other end of this correlation, if `id` is on it.
    pub fn other_end<'a>(&'a self, id: &str) -> Option<&'a str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// Merge-gate summary over all findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub blocked: bool,
    pub override_applied: bool,
}

/// The typed structure handed to the report renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub findings: Vec<DriftFinding>,
    pub correlations: Vec<Correlation>,
    pub summary: ReportSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_low_medium_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::High.upgraded(), Severity::High);
        assert_eq!(Severity::Low.upgraded(), Severity::Medium);
    }

    #[test]
    fn finding_round_trips_through_json() {
        let finding = DriftFinding {
            drift_type: DriftType::Database,
            file: "migrations/001.sql".into(),
            severity: Severity::High,
            changes: vec!["DROP TABLE: users".into()],
            reasoning: vec!["Destructive schema change".into()],
            entities: vec!["users".into()],
            endpoints: vec![],
            metadata: Some(FindingMetadata {
                tables_analyzed: Some(1),
                ..Default::default()
            }),
            artifact_id: Some("db:table:users".into()),
            correlation_impact: None,
        };

        let json = serde_json::to_string(&finding).unwrap();
        let back: DriftFinding = serde_json::from_str(&json).unwrap();
        assert_eq!(finding, back);
    }

    #[test]
    fn drift_type_serializes_lowercase() {
        let json = serde_json::to_string(&DriftType::Infrastructure).unwrap();
        assert_eq!(json, "\"infrastructure\"");
    }
}
