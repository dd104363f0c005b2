//! The staged pipeline: analyzers in parallel, artifact expansion,
//! correlation, severity reassessment, report assembly.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use driftgate_analyzers::{ConfigAnalyzer, IacAnalyzer, OpenApiAnalyzer, SqlAnalyzer};
use driftgate_core::risk::{apply_override, RiskAssessment};
use driftgate_core::{
    expand_findings, AnalyzeContext, ChangeSet, ContentFetcher, DriftAnalyzer, DriftConfig,
    DriftFinding, DriftReport, ReportSummary, Severity,
};
use driftgate_correlate::{reassess, CorrelationEngine};
use driftgate_parser::CodeAnalyzer;

pub struct DriftGate {
    config: DriftConfig,
    fetcher: Arc<dyn ContentFetcher>,
    analyzers: Vec<Arc<dyn DriftAnalyzer>>,
    code: Arc<CodeAnalyzer>,
    engine: CorrelationEngine,
}

impl DriftGate {
    pub fn new(config: DriftConfig, fetcher: Arc<dyn ContentFetcher>) -> Self {
        let code = Arc::new(CodeAnalyzer::new());
        let analyzers: Vec<Arc<dyn DriftAnalyzer>> = vec![
            Arc::new(OpenApiAnalyzer),
            Arc::new(SqlAnalyzer),
            Arc::new(IacAnalyzer),
            Arc::new(ConfigAnalyzer),
            code.clone(),
        ];
        Self {
            config,
            fetcher,
            analyzers,
            code,
            engine: CorrelationEngine::new(),
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub async fn run(&self, change_set: &ChangeSet) -> DriftReport {
        self.run_with_cancel(change_set, CancellationToken::new())
            .await
    }

    /// Run the full pipeline. Analyzer failures degrade to zero findings for
    /// that layer; the report is always produced.
    pub async fn run_with_cancel(
        &self,
        change_set: &ChangeSet,
        cancel: CancellationToken,
    ) -> DriftReport {
        info!(
            base = %change_set.base_ref,
            head = %change_set.head_ref,
            files = change_set.files.len(),
            "analyzing change set"
        );
        let ctx = AnalyzeContext::new(change_set, self.fetcher.as_ref(), &self.config, cancel);

        let runs = self.analyzers.iter().map(|analyzer| {
            let ctx = &ctx;
            async move { (analyzer.name(), analyzer.analyze(ctx).await) }
        });
        let mut findings: Vec<DriftFinding> = Vec::new();
        for (name, outcome) in join_all(runs).await {
            match outcome {
                Ok(layer_findings) => findings.extend(layer_findings),
                Err(error) => warn!(analyzer = name, %error, "analyzer failed; layer skipped"),
            }
        }

        let mut findings = expand_findings(findings);
        let correlations =
            self.engine
                .correlate(&findings, self.code.current_index(), &self.config);
        reassess(&mut findings, &correlations, &self.config);

        // Deterministic output regardless of task interleaving.
        findings.sort_by(|a, b| {
            (a.drift_type, &a.file, a.changes.first()).cmp(&(b.drift_type, &b.file, b.changes.first()))
        });

        let summary = self.summarize(&findings);
        info!(
            findings = findings.len(),
            correlations = correlations.len(),
            blocked = summary.blocked,
            "drift analysis complete"
        );
        DriftReport {
            findings,
            correlations,
            summary,
        }
    }

    fn summarize(&self, findings: &[DriftFinding]) -> ReportSummary {
        let high = findings.iter().filter(|f| f.severity == Severity::High).count();
        let medium = findings
            .iter()
            .filter(|f| f.severity == Severity::Medium)
            .count();
        let low = findings.iter().filter(|f| f.severity == Severity::Low).count();

        let overall = if high > 0 {
            Severity::High
        } else if medium > 0 {
            Severity::Medium
        } else {
            Severity::Low
        };
        let assessment = apply_override(
            RiskAssessment {
                severity: overall,
                reasoning: Vec::new(),
                override_info: None,
                allow_merge: overall != Severity::High,
            },
            self.config.override_reason(),
        );
        let override_applied = assessment
            .override_info
            .as_ref()
            .map(|o| o.applied)
            .unwrap_or(false);

        ReportSummary {
            high,
            medium,
            low,
            blocked: high > 0 && !override_applied,
            override_applied,
        }
    }
}
