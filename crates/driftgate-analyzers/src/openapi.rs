//! OpenAPI specification analyzer: loads base and head revisions of the
//! configured spec, runs a structured diff, and classifies the outcome.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use driftgate_core::risk::score_changes;
use driftgate_core::{
    normalize_path, AnalyzeContext, DriftAnalyzer, DriftConfig, DriftFinding, DriftType,
    FileStatus, FindingMetadata, RenameInfo, Result,
};

use crate::loader::parse_document;

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "options", "head"];
const OPENAPI_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

pub struct OpenApiAnalyzer;

#[derive(Debug, Clone, PartialEq)]
struct SpecChange {
    kind: String,
    path: String,
    endpoint: Option<String>,
    breaking: bool,
}

impl SpecChange {
    fn new(kind: &str, path: String) -> Self {
        Self {
            kind: kind.to_string(),
            path,
            endpoint: None,
            breaking: false,
        }
    }
}

#[async_trait]
impl DriftAnalyzer for OpenApiAnalyzer {
    fn name(&self) -> &'static str {
        "openapi"
    }

    fn can_handle(&self, path: &str, config: &DriftConfig) -> bool {
        config
            .openapi_path
            .as_deref()
            .map(|p| normalize_path(p) == normalize_path(path))
            .unwrap_or(false)
    }

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>> {
        let Some(configured) = ctx.config.openapi_path.as_deref() else {
            return Ok(Vec::new());
        };
        let configured = normalize_path(configured);

        let (base_path, head_path) = match self.locate(ctx, &configured) {
            Some(paths) => paths,
            None => return Ok(Vec::new()),
        };
        if base_path != head_path {
            info!(from = %base_path, to = %head_path, "treating OpenAPI spec move as a rename");
        }

        let base_raw = ctx.fetch_text(&base_path, &ctx.change_set.base_ref).await?;
        let head_raw = ctx.fetch_text(&head_path, &ctx.change_set.head_ref).await?;

        let base_spec = base_raw
            .as_deref()
            .and_then(|text| parse_document(&base_path, text))
            .filter(is_openapi);
        let head_spec = head_raw
            .as_deref()
            .and_then(|text| parse_document(&head_path, text))
            .filter(is_openapi);

        let mut finding = DriftFinding::new(DriftType::Api, head_path.clone());
        if base_path != head_path {
            finding.metadata = Some(FindingMetadata {
                renamed: Some(RenameInfo {
                    from: base_path.clone(),
                    to: head_path.clone(),
                }),
                ..Default::default()
            });
        }

        match (&base_spec, &head_spec) {
            (None, None) => {
                if base_raw.is_none() && head_raw.is_none() {
                    return Ok(Vec::new());
                }
                if base_raw != head_raw {
                    finding.changes.push(
                        "OpenAPI specification changes detected (detailed analysis failed)"
                            .to_string(),
                    );
                } else {
                    return Ok(Vec::new());
                }
            }
            (Some(base), None) => {
                finding
                    .changes
                    .push("API_DELETION: OpenAPI specification was deleted".to_string());
                finding.endpoints = list_endpoints(base);
                finding.file = base_path.clone();
            }
            (None, Some(head)) => {
                finding
                    .changes
                    .push("New OpenAPI specification added".to_string());
                finding.endpoints = list_endpoints(head);
            }
            (Some(base), Some(head)) => {
                let diff = diff_specs(base, head);
                if diff.is_empty() {
                    if base_raw != head_raw {
                        finding.changes.push(
                            "OpenAPI specification changes detected (detailed analysis failed)"
                                .to_string(),
                        );
                    } else {
                        return Ok(Vec::new());
                    }
                }
                for change in diff {
                    finding.changes.push(classify(&change));
                    if let Some(endpoint) = change.endpoint {
                        if !finding.endpoints.contains(&endpoint) {
                            finding.endpoints.push(endpoint);
                        }
                    }
                }
            }
        }

        let score = score_changes(&finding.changes, "api");
        finding.severity = score.severity;
        finding.reasoning = score.reasoning;
        debug!(
            changes = finding.changes.len(),
            endpoints = finding.endpoints.len(),
            severity = %finding.severity,
            "openapi analysis complete"
        );
        Ok(vec![finding])
    }
}

impl OpenApiAnalyzer {
    /// Resolve the (base, head) paths to read, honoring rename detection:
    /// when the configured path is untouched but a spec-shaped file was
    /// removed and another added, analyze removed@base against added@head.
    fn locate(&self, ctx: &AnalyzeContext<'_>, configured: &str) -> Option<(String, String)> {
        if ctx.change_set.contains(configured)
            || ctx
                .change_set
                .files
                .iter()
                .any(|f| normalize_path(&f.path) == configured)
        {
            return Some((configured.to_string(), configured.to_string()));
        }

        let removed = ctx
            .change_set
            .files
            .iter()
            .find(|f| f.status == FileStatus::Removed && has_openapi_extension(&f.path))?;
        // The rename target is the configured path when it was added,
        // otherwise the first added spec-shaped file.
        let added = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Added)
            .find(|f| normalize_path(&f.path) == configured)
            .or_else(|| {
                ctx.change_set
                    .files
                    .iter()
                    .find(|f| f.status == FileStatus::Added && has_openapi_extension(&f.path))
            })?;
        Some((
            normalize_path(&removed.path),
            normalize_path(&added.path),
        ))
    }
}

fn has_openapi_extension(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| OPENAPI_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A document is treated as an OpenAPI spec when it carries a version marker
/// and a `paths` object.
fn is_openapi(value: &Value) -> bool {
    (value.get("openapi").is_some() || value.get("swagger").is_some())
        && value.get("paths").map(Value::is_object).unwrap_or(false)
}

fn list_endpoints(spec: &Value) -> Vec<String> {
    let mut endpoints = Vec::new();
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };
    for (path, operations) in paths {
        let Some(operations) = operations.as_object() else {
            continue;
        };
        for method in operations.keys() {
            if HTTP_METHODS.contains(&method.to_lowercase().as_str()) {
                endpoints.push(format!("{}:{}", method.to_uppercase(), path));
            }
        }
    }
    endpoints
}

fn classify(change: &SpecChange) -> String {
    match change.kind.as_str() {
        "endpoint_removed" => format!("BREAKING_CHANGE: {}", change.path),
        _ if change.breaking => format!("BREAKING_CHANGE: {}", change.path),
        "endpoint_added" => format!(
            "API_EXPANSION: {}",
            change.endpoint.as_deref().unwrap_or(&change.path)
        ),
        "modified" => format!("Modified: {}", change.path),
        _ => "OpenAPI specification changes detected (fallback detection)".to_string(),
    }
}

/// Structured diff over the `paths` tree plus shallow top-level comparison.
fn diff_specs(base: &Value, head: &Value) -> Vec<SpecChange> {
    let mut changes = Vec::new();
    let empty = serde_json::Map::new();
    let base_paths = base.get("paths").and_then(Value::as_object).unwrap_or(&empty);
    let head_paths = head.get("paths").and_then(Value::as_object).unwrap_or(&empty);

    for (path, base_ops) in base_paths {
        match head_paths.get(path) {
            None => {
                for method in methods_of(base_ops) {
                    let mut c = SpecChange::new(
                        "endpoint_removed",
                        format!("/paths{}/{}", path, method),
                    );
                    c.endpoint = Some(format!("{}:{}", method.to_uppercase(), path));
                    c.breaking = true;
                    changes.push(c);
                }
            }
            Some(head_ops) => {
                diff_path_item(path, base_ops, head_ops, &mut changes);
            }
        }
    }
    for (path, head_ops) in head_paths {
        if !base_paths.contains_key(path) {
            for method in methods_of(head_ops) {
                let mut c =
                    SpecChange::new("endpoint_added", format!("/paths{}/{}", path, method));
                c.endpoint = Some(format!("{}:{}", method.to_uppercase(), path));
                changes.push(c);
            }
        }
    }

    // Top-level sections other than paths.
    for section in ["info", "servers", "components", "security"] {
        if base.get(section) != head.get(section) {
            changes.push(SpecChange::new("modified", format!("/{}", section)));
        }
    }

    changes
}

fn methods_of(path_item: &Value) -> Vec<String> {
    path_item
        .as_object()
        .map(|ops| {
            ops.keys()
                .filter(|k| HTTP_METHODS.contains(&k.to_lowercase().as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn diff_path_item(path: &str, base: &Value, head: &Value, changes: &mut Vec<SpecChange>) {
    let base_methods = methods_of(base);
    let head_methods = methods_of(head);

    for method in &base_methods {
        if !head_methods.contains(method) {
            let mut c =
                SpecChange::new("endpoint_removed", format!("/paths{}/{}", path, method));
            c.endpoint = Some(format!("{}:{}", method.to_uppercase(), path));
            c.breaking = true;
            changes.push(c);
        }
    }
    for method in &head_methods {
        if !base_methods.contains(method) {
            let mut c = SpecChange::new("endpoint_added", format!("/paths{}/{}", path, method));
            c.endpoint = Some(format!("{}:{}", method.to_uppercase(), path));
            changes.push(c);
        }
    }
    for method in base_methods.iter().filter(|m| head_methods.contains(*m)) {
        let base_op = &base[method.as_str()];
        let head_op = &head[method.as_str()];
        if base_op == head_op {
            continue;
        }
        let op_path = format!("/paths{}/{}", path, method);
        let endpoint = format!("{}:{}", method.to_uppercase(), path);
        let breaking = operation_change_is_breaking(base_op, head_op);
        let mut c = SpecChange::new("modified", op_path);
        c.endpoint = Some(endpoint);
        c.breaking = breaking;
        changes.push(c);
    }
}

/// A modification is breaking when the head operation demands something the
/// base did not: a new required parameter, or a grown `required` list in the
/// request body schema.
fn operation_change_is_breaking(base: &Value, head: &Value) -> bool {
    let base_required = required_parameter_names(base);
    let head_required = required_parameter_names(head);
    if head_required.iter().any(|p| !base_required.contains(p)) {
        return true;
    }

    let base_fields = required_body_fields(base);
    let head_fields = required_body_fields(head);
    head_fields.iter().any(|f| !base_fields.contains(f))
}

fn required_parameter_names(operation: &Value) -> Vec<String> {
    operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .filter(|p| p.get("required").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|p| p.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn required_body_fields(operation: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    let Some(content) = operation
        .get("requestBody")
        .and_then(|b| b.get("content"))
        .and_then(Value::as_object)
    else {
        return fields;
    };
    for media in content.values() {
        if let Some(required) = media
            .get("schema")
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
        {
            fields.extend(
                required
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from),
            );
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(paths: serde_json::Value) -> Value {
        serde_json::json!({ "openapi": "3.0.0", "info": {"title": "t", "version": "1"}, "paths": paths })
    }

    #[test]
    fn validates_spec_shape() {
        assert!(is_openapi(&spec(serde_json::json!({}))));
        assert!(!is_openapi(&serde_json::json!({"paths": {}})));
        assert!(!is_openapi(&serde_json::json!({"openapi": "3.0.0"})));
    }

    #[test]
    fn removed_endpoint_is_breaking() {
        let base = spec(serde_json::json!({"/users": {"get": {}}}));
        let head = spec(serde_json::json!({}));
        let changes = diff_specs(&base, &head);
        assert_eq!(changes.len(), 1);
        assert_eq!(classify(&changes[0]), "BREAKING_CHANGE: /paths/users/get");
    }

    #[test]
    fn added_endpoint_is_expansion() {
        let base = spec(serde_json::json!({}));
        let head = spec(serde_json::json!({"/orders": {"post": {}}}));
        let changes = diff_specs(&base, &head);
        assert_eq!(classify(&changes[0]), "API_EXPANSION: POST:/orders");
    }

    #[test]
    fn new_required_parameter_is_breaking() {
        let base = spec(serde_json::json!({"/users": {"get": {"parameters": []}}}));
        let head = spec(serde_json::json!({"/users": {"get": {"parameters": [
            {"name": "tenant", "in": "query", "required": true}
        ]}}}));
        let changes = diff_specs(&base, &head);
        assert!(changes[0].breaking);
        assert!(classify(&changes[0]).starts_with("BREAKING_CHANGE"));
    }

    #[test]
    fn cosmetic_operation_change_is_modified() {
        let base = spec(serde_json::json!({"/users": {"get": {"summary": "a"}}}));
        let head = spec(serde_json::json!({"/users": {"get": {"summary": "b"}}}));
        let changes = diff_specs(&base, &head);
        assert_eq!(classify(&changes[0]), "Modified: /paths/users/get");
    }

    #[test]
    fn endpoint_listing_uppercases_methods() {
        let s = spec(serde_json::json!({"/users": {"get": {}, "post": {}, "parameters": []}}));
        let mut endpoints = list_endpoints(&s);
        endpoints.sort();
        assert_eq!(endpoints, vec!["GET:/users", "POST:/users"]);
    }

    mod rename {
        use super::*;
        use async_trait::async_trait;
        use driftgate_core::{
            AnalyzeContext, ChangeSet, ChangedFile, ContentFetcher, DriftConfig, FetchedContent,
            FileStatus, Result,
        };
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

        #[tokio::test]
        async fn removed_plus_added_spec_is_analyzed_as_a_rename() {
            let base_spec =
                serde_json::to_string(&spec(serde_json::json!({"/users": {"get": {}}}))).unwrap();
            let head_spec = serde_json::to_string(&spec(
                serde_json::json!({"/users": {"get": {}}, "/orders": {"post": {}}}),
            ))
            .unwrap();

            let mut files = HashMap::new();
            files.insert(("base".to_string(), "old/openapi.json".to_string()), base_spec);
            files.insert(("head".to_string(), "api/openapi.json".to_string()), head_spec);
            let fetcher = MapFetcher { files };

            let config = DriftConfig {
                openapi_path: Some("api/spec.yaml".into()),
                ..Default::default()
            };
            let change_set = ChangeSet {
                base_ref: "base".into(),
                head_ref: "head".into(),
                files: vec![
                    ChangedFile::new("old/openapi.json", FileStatus::Removed),
                    ChangedFile::new("api/openapi.json", FileStatus::Added),
                ],
            };
            let ctx =
                AnalyzeContext::new(&change_set, &fetcher, &config, CancellationToken::new());

            let findings = OpenApiAnalyzer.analyze(&ctx).await.unwrap();
            assert_eq!(findings.len(), 1);
            let finding = &findings[0];
            assert!(finding
                .changes
                .contains(&"API_EXPANSION: POST:/orders".to_string()));
            let renamed = finding.metadata.as_ref().unwrap().renamed.as_ref().unwrap();
            assert_eq!(renamed.from, "old/openapi.json");
            assert_eq!(renamed.to, "api/openapi.json");
        }
    }
}
