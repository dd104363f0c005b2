//! Infrastructure-as-code analyzer: Terraform plan JSON, CloudFormation
//! templates, raw HCL fallback, and Kubernetes manifests.

pub mod cloudformation;
pub mod cost;
pub mod hcl;
pub mod kubernetes;
pub mod properties;
pub mod terraform;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::debug;

use driftgate_core::risk::score_changes;
use driftgate_core::{
    glob_match, normalize_path, AnalyzeContext, DriftAnalyzer, DriftConfig, DriftFinding,
    DriftType, FileStatus, FindingMetadata, Result, Severity,
};

use crate::loader::parse_document;
use terraform::TerraformDiff;

pub struct IacAnalyzer;

impl IacAnalyzer {
    fn is_terraform_plan(path: &str, config: &DriftConfig) -> bool {
        config
            .terraform_path
            .as_deref()
            .map(|p| normalize_path(p) == normalize_path(path))
            .unwrap_or(false)
    }

    fn is_cloudformation(path: &str, config: &DriftConfig) -> bool {
        config
            .cloudformation_glob
            .as_deref()
            .map(|g| glob_match(g, path))
            .unwrap_or(false)
    }

    fn is_hcl(path: &str) -> bool {
        path.ends_with(".tf")
    }

    fn is_yaml(path: &str) -> bool {
        path.ends_with(".yaml") || path.ends_with(".yml")
    }
}

fn finding_from_diff(path: &str, diff: TerraformDiff) -> Option<DriftFinding> {
    if diff.changes.is_empty() {
        return None;
    }
    let score = score_changes(&diff.changes, "infrastructure");
    let mut finding = DriftFinding::new(DriftType::Infrastructure, path);
    finding.severity = score.severity;
    finding.reasoning = score.reasoning;
    // A security-sensitive property path is never purely cosmetic.
    if !diff.security_notes.is_empty() && finding.severity == Severity::Low {
        finding.severity = Severity::Medium;
    }
    finding.reasoning.extend(diff.security_notes);
    finding.changes = diff.changes;
    finding.entities = diff.entities;
    if let Some(cost) = diff.cost_impact {
        finding.metadata = Some(FindingMetadata {
            cost_impact: Some(cost),
            ..Default::default()
        });
    }
    Some(finding)
}

#[async_trait]
impl DriftAnalyzer for IacAnalyzer {
    fn name(&self) -> &'static str {
        "iac"
    }

    fn can_handle(&self, path: &str, config: &DriftConfig) -> bool {
        Self::is_terraform_plan(path, config)
            || Self::is_cloudformation(path, config)
            || Self::is_hcl(path)
            || Self::is_yaml(path)
    }

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>> {
        let mut findings = Vec::new();

        if let Some(plan_path) = ctx.config.terraform_path.as_deref() {
            let plan_path = normalize_path(plan_path);
            if ctx
                .change_set
                .files
                .iter()
                .any(|f| normalize_path(&f.path) == plan_path)
            {
                let (base_raw, head_raw) = ctx.fetch_both(&plan_path).await?;
                let base = base_raw
                    .as_deref()
                    .and_then(|t| parse_document(&plan_path, t));
                let head = head_raw
                    .as_deref()
                    .and_then(|t| parse_document(&plan_path, t));
                if let Some(head) = head {
                    let diff =
                        terraform::diff_plans(base.as_ref(), &head, ctx.config.cost_threshold);
                    findings.extend(finding_from_diff(&plan_path, diff));
                }
            }
        }

        let cf_paths: Vec<String> = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .filter(|f| Self::is_cloudformation(&f.path, ctx.config))
            .map(|f| normalize_path(&f.path))
            .collect();
        for path in cf_paths {
            let (base_raw, head_raw) = ctx.fetch_both(&path).await?;
            let base = base_raw.as_deref().and_then(|t| parse_document(&path, t));
            let head = head_raw.as_deref().and_then(|t| parse_document(&path, t));
            if let Some(head) = head {
                let diff = cloudformation::diff_templates(
                    base.as_ref(),
                    &head,
                    ctx.config.cost_threshold,
                );
                findings.extend(finding_from_diff(&path, diff));
            }
        }

        let hcl_paths: Vec<String> = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .filter(|f| Self::is_hcl(&f.path))
            .map(|f| f.path.clone())
            .collect();
        let fan_out = ctx.config.fetch_fan_out.max(1);
        let hcl_fetched: Vec<(String, Option<String>)> = stream::iter(hcl_paths)
            .map(|path| async move {
                let content = ctx.fetch_text(&path, &ctx.change_set.head_ref).await;
                (normalize_path(&path), content.unwrap_or_default())
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;
        for (path, content) in hcl_fetched {
            let Some(content) = content else { continue };
            let scan = hcl::scan_hcl(&content);
            if scan.changes.is_empty() {
                continue;
            }
            let score = score_changes(&scan.changes, "infrastructure");
            let mut finding = DriftFinding::new(DriftType::Infrastructure, &path);
            finding.severity = score.severity;
            finding.reasoning = score.reasoning;
            finding.changes = scan.changes;
            finding.entities = scan.entities;
            findings.push(finding);
        }

        // Kubernetes manifests are recognized by content, not configuration:
        // the CloudFormation glob and the OpenAPI path take precedence.
        let yaml_paths: Vec<String> = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .filter(|f| Self::is_yaml(&f.path))
            .filter(|f| !Self::is_cloudformation(&f.path, ctx.config))
            .filter(|f| {
                ctx.config
                    .openapi_path
                    .as_deref()
                    .map(|p| normalize_path(p) != normalize_path(&f.path))
                    .unwrap_or(true)
            })
            .map(|f| f.path.clone())
            .collect();
        let yaml_fetched: Vec<(String, Option<String>)> = stream::iter(yaml_paths)
            .map(|path| async move {
                let content = ctx.fetch_text(&path, &ctx.change_set.head_ref).await;
                (normalize_path(&path), content.unwrap_or_default())
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;
        for (path, content) in yaml_fetched {
            let Some(content) = content else { continue };
            let Some(doc) = parse_document(&path, &content) else {
                continue;
            };
            if !kubernetes::is_manifest(&doc) {
                continue;
            }
            let scan = kubernetes::scan_manifest(&doc);
            if scan.changes.is_empty() {
                continue;
            }
            let score = score_changes(&scan.changes, "infrastructure");
            let mut finding = DriftFinding::new(DriftType::Infrastructure, &path);
            finding.severity = score.severity;
            finding.reasoning = score.reasoning;
            finding.changes = scan.changes;
            finding.entities = scan.entities;
            findings.push(finding);
        }

        debug!(findings = findings.len(), "iac analysis complete");
        Ok(findings)
    }
}
