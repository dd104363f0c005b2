//! The code analyzer: parses changed source files through the language
//! adapters, memoizes results in a process-wide content-hash cache, and
//! surfaces changed API handlers as api-layer findings.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use driftgate_core::{
    normalize_path, AnalyzeContext, DriftAnalyzer, DriftConfig, DriftFinding, DriftType,
    FileStatus, Result,
};

use crate::index::CodeIndex;
use crate::language::{LanguageRegistry, SourceLanguage};
use crate::languages::{
    go::GoAdapter, java::JavaAdapter, javascript::JavaScriptAdapter, python::PythonAdapter,
    LanguageAdapter,
};
use crate::types::FileAnalysis;

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Dispatch to the language adapter. `None` when parsing fails.
pub fn analyze_source(
    language: SourceLanguage,
    file_path: &str,
    content: &str,
) -> Option<FileAnalysis> {
    match language {
        SourceLanguage::JavaScript | SourceLanguage::TypeScript => {
            JavaScriptAdapter::analyze_as(language, file_path, content)
        }
        SourceLanguage::Python => PythonAdapter::analyze(file_path, content),
        SourceLanguage::Go => GoAdapter::analyze(file_path, content),
        SourceLanguage::Java => JavaAdapter::analyze(file_path, content),
        SourceLanguage::Kotlin => JavaAdapter::analyze_kotlin(file_path, content),
    }
}

/// Process-wide analyzer. The cache maps file path to its last analysis;
/// entries are immutable once inserted and keyed by content hash, so
/// re-analysis of unchanged files short-circuits.
pub struct CodeAnalyzer {
    registry: LanguageRegistry,
    cache: DashMap<String, Arc<FileAnalysis>>,
    index: RwLock<Arc<CodeIndex>>,
}

impl CodeAnalyzer {
    pub fn new() -> Self {
        Self {
            registry: LanguageRegistry::new(),
            cache: DashMap::new(),
            index: RwLock::new(Arc::new(CodeIndex::default())),
        }
    }

    /// The index built by the most recent [`analyze`](DriftAnalyzer::analyze)
    /// run; consumed by the code correlation strategy.
    pub fn current_index(&self) -> Arc<CodeIndex> {
        self.index.read().clone()
    }

    fn analyze_cached(&self, path: &str, content: &str) -> Option<Arc<FileAnalysis>> {
        let hash = content_hash(content);
        if let Some(cached) = self.cache.get(path) {
            if cached.hash == hash {
                return Some(cached.clone());
            }
        }
        let language = self.registry.detect_language(path)?;
        let mut analysis = analyze_source(language, path, content)?;
        analysis.hash = hash;
        let analysis = Arc::new(analysis);
        self.cache.insert(path.to_string(), analysis.clone());
        Some(analysis)
    }
}

impl Default for CodeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriftAnalyzer for CodeAnalyzer {
    fn name(&self) -> &'static str {
        "code"
    }

    fn can_handle(&self, path: &str, _config: &DriftConfig) -> bool {
        self.registry.detect_language(path).is_some()
    }

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>> {
        let targets: Vec<String> = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .filter(|f| self.registry.detect_language(&f.path).is_some())
            .map(|f| normalize_path(&f.path))
            .collect();

        let fan_out = ctx.config.fetch_fan_out.max(1);
        let fetched: Vec<(String, Option<String>)> = stream::iter(targets)
            .map(|path| async move {
                let content = ctx
                    .fetch_text(&path, &ctx.change_set.head_ref)
                    .await
                    .unwrap_or_default();
                (path, content)
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;

        let mut index = CodeIndex::default();
        for (path, content) in fetched {
            let Some(content) = content else { continue };
            match self.analyze_cached(&path, &content) {
                Some(analysis) => {
                    index.files.insert(path, analysis);
                }
                None => warn!(path = %path, "failed to parse source file; skipping"),
            }
        }

        let mut findings = Vec::new();
        for (path, analysis) in &index.files {
            if analysis.handlers.is_empty() {
                continue;
            }
            let mut finding = DriftFinding::new(DriftType::Api, path.clone());
            for handler in &analysis.handlers {
                let endpoint = handler.endpoint();
                finding
                    .changes
                    .push(format!("API_HANDLER_CHANGED: {}", endpoint));
                if !finding.endpoints.contains(&endpoint) {
                    finding.endpoints.push(endpoint);
                }
            }
            finding
                .reasoning
                .push(format!("API handlers changed in {}", path));
            findings.push(finding);
        }

        debug!(
            files = index.files.len(),
            findings = findings.len(),
            "code analysis complete"
        );
        *self.index.write() = Arc::new(index);
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use driftgate_core::{ChangeSet, ChangedFile, ContentFetcher, FetchedContent, Severity};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    struct MapFetcher {
        files: HashMap<(String, String), String>,
    }

    #[async_trait]
    impl ContentFetcher for MapFetcher {
        async fn fetch(&self, path: &str, rev: &str) -> Result<Option<FetchedContent>> {
            Ok(self
                .files
                .get(&(rev.to_string(), path.to_string()))
                .map(|text| FetchedContent::from_plain(text)))
        }
    }

    const ROUTES: &str = r#"
const { getUserById } = require('./users-service');
router.get('/v1/users/:id', getUserById);
"#;

    #[tokio::test]
    async fn handlers_in_changed_files_become_api_findings() {
        let mut files = HashMap::new();
        files.insert(
            ("head".to_string(), "src/routes/users.js".to_string()),
            ROUTES.to_string(),
        );
        let fetcher = MapFetcher { files };
        let config = DriftConfig::default();
        let change_set = ChangeSet {
            base_ref: "base".into(),
            head_ref: "head".into(),
            files: vec![ChangedFile::new(
                "src/routes/users.js",
                FileStatus::Modified,
            )],
        };
        let ctx = AnalyzeContext::new(&change_set, &fetcher, &config, CancellationToken::new());

        let analyzer = CodeAnalyzer::new();
        let findings = analyzer.analyze(&ctx).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].drift_type, DriftType::Api);
        assert_eq!(findings[0].severity, Severity::Low);
        assert_eq!(findings[0].endpoints, vec!["GET:/v1/users/{id}"]);
        assert_eq!(
            findings[0].changes,
            vec!["API_HANDLER_CHANGED: GET:/v1/users/{id}"]
        );
        assert!(!analyzer.current_index().is_empty());
    }

    #[tokio::test]
    async fn unchanged_content_reuses_the_cache() {
        let analyzer = CodeAnalyzer::new();
        let first = analyzer
            .analyze_cached("src/a.js", "function f() { return g(); }")
            .unwrap();
        let second = analyzer
            .analyze_cached("src/a.js", "function f() { return g(); }")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let changed = analyzer
            .analyze_cached("src/a.js", "function f() { return h(); }")
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &changed));
    }
}
