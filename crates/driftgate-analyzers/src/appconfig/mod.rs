//! Configuration analyzer: generic config key diffs, package manifests,
//! lockfiles, docker-compose services, and feature flags.

pub mod compose;
pub mod keys;
pub mod lockfile;
pub mod manifest;
pub mod version;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::debug;

use driftgate_core::risk::score_changes;
use driftgate_core::{
    glob_match, normalize_path, AnalyzeContext, DriftAnalyzer, DriftConfig, DriftFinding,
    DriftType, Result,
};

use crate::loader::parse_document;

pub struct ConfigAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKind {
    Manifest,
    Lockfile,
    Compose,
    FeatureFlags,
    Generic,
}

impl ConfigAnalyzer {
    fn classify(path: &str, config: &DriftConfig) -> Option<ConfigKind> {
        let normalized = normalize_path(path);
        let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);

        if file_name == "package.json" {
            return Some(ConfigKind::Manifest);
        }
        if file_name == "package-lock.json" || file_name == "npm-shrinkwrap.json" {
            return Some(ConfigKind::Lockfile);
        }
        if file_name.starts_with("docker-compose")
            && (file_name.ends_with(".yml") || file_name.ends_with(".yaml"))
        {
            return Some(ConfigKind::Compose);
        }
        if let Some(glob) = config.feature_flag_glob.as_deref() {
            if glob_match(glob, &normalized) {
                return Some(ConfigKind::FeatureFlags);
            }
        }
        if config.config_globs.iter().any(|g| glob_match(g, &normalized)) {
            return Some(ConfigKind::Generic);
        }
        None
    }
}

#[async_trait]
impl DriftAnalyzer for ConfigAnalyzer {
    fn name(&self) -> &'static str {
        "configuration"
    }

    fn can_handle(&self, path: &str, config: &DriftConfig) -> bool {
        Self::classify(path, config).is_some()
    }

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>> {
        let targets: Vec<(String, ConfigKind)> = ctx
            .change_set
            .files
            .iter()
            .filter_map(|f| {
                Self::classify(&f.path, ctx.config).map(|kind| (normalize_path(&f.path), kind))
            })
            .collect();

        let fan_out = ctx.config.fetch_fan_out.max(1);
        let fetched: Vec<(String, ConfigKind, Option<String>, Option<String>)> =
            stream::iter(targets)
                .map(|(path, kind)| async move {
                    let pair = ctx.fetch_both(&path).await.unwrap_or((None, None));
                    (path, kind, pair.0, pair.1)
                })
                .buffer_unordered(fan_out)
                .collect()
                .await;

        let mut findings = Vec::new();
        for (path, kind, base_raw, head_raw) in fetched {
            if base_raw.is_none() && head_raw.is_none() {
                continue;
            }
            let base = base_raw.as_deref().and_then(|t| parse_document(&path, t));
            let head = head_raw.as_deref().and_then(|t| parse_document(&path, t));

            let changes = match kind {
                ConfigKind::Manifest => match &head {
                    Some(head) => manifest::diff_manifests(base.as_ref(), head),
                    None => base
                        .as_ref()
                        .map(|b| {
                            manifest::dependencies(b)
                                .keys()
                                .map(|name| format!("DEPENDENCY_REMOVED: {}", name))
                                .collect()
                        })
                        .unwrap_or_default(),
                },
                ConfigKind::Lockfile => match &head {
                    Some(head) => lockfile::diff_lockfiles(&path, base.as_ref(), head),
                    None => Vec::new(),
                },
                ConfigKind::Compose => compose::diff_services(base.as_ref(), head.as_ref()),
                ConfigKind::FeatureFlags => {
                    compose::diff_feature_flags(base.as_ref(), head.as_ref())
                }
                ConfigKind::Generic => {
                    let base_keys = base.as_ref().map(keys::extract_keys).unwrap_or_default();
                    let head_keys = head.as_ref().map(keys::extract_keys).unwrap_or_default();
                    keys::diff_keys(&base_keys, &head_keys).changes
                }
            };

            if changes.is_empty() {
                continue;
            }
            let score = score_changes(&changes, "configuration");
            let mut finding = DriftFinding::new(DriftType::Configuration, &path);
            finding.severity = score.severity;
            finding.reasoning = score.reasoning;
            finding.changes = changes;
            findings.push(finding);
        }

        debug!(findings = findings.len(), "configuration analysis complete");
        Ok(findings)
    }
}
