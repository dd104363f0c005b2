//! Artifact identity: canonical IDs, undirected pair keys, compound-finding
//! expansion, and token resolution for user-defined rules.

use globset::Glob;

use crate::paths::{is_glob, normalize_path};
use crate::types::{DriftFinding, DriftType};

/// Canonical ID for an endpoint token of the form `METHOD:path` or
/// `METHOD path`.
pub fn api_artifact_id(endpoint: &str) -> String {
    let (method, path) = split_endpoint(endpoint);
    format!("api:{}:{}", method.to_uppercase(), path.to_lowercase())
}

pub fn split_endpoint(endpoint: &str) -> (&str, &str) {
    if let Some((method, path)) = endpoint.split_once(':') {
        (method.trim(), path.trim())
    } else if let Some((method, path)) = endpoint.split_once(' ') {
        (method.trim(), path.trim())
    } else {
        ("GET", endpoint.trim())
    }
}

pub fn table_artifact_id(table: &str) -> String {
    format!("db:table:{}", table.trim().to_lowercase())
}

/// Infrastructure addresses look like `aws_security_group.web` or
/// `service/web`; the resource type is the leading segment.
pub fn infra_artifact_id(address: &str) -> String {
    let address = address.trim().to_lowercase();
    let resource_type = address
        .split(|c| c == '.' || c == '/')
        .next()
        .unwrap_or(address.as_str());
    format!("iac:{}:{}", resource_type, address)
}

pub fn config_artifact_id(path: &str) -> String {
    format!("config:{}", normalize_path(path).to_lowercase())
}

pub fn file_artifact_id(path: &str) -> String {
    format!("file:{}", normalize_path(path).to_lowercase())
}

/// Derive the canonical artifact ID for a finding. Depends only on the
/// finding's canonical fields.
pub fn artifact_id(finding: &DriftFinding) -> String {
    match finding.drift_type {
        DriftType::Api => finding
            .endpoints
            .first()
            .map(|e| api_artifact_id(e))
            .unwrap_or_else(|| file_artifact_id(&finding.file)),
        DriftType::Database => finding
            .entities
            .first()
            .map(|t| table_artifact_id(t))
            .unwrap_or_else(|| file_artifact_id(&finding.file)),
        DriftType::Infrastructure => finding
            .entities
            .first()
            .map(|a| infra_artifact_id(a))
            .unwrap_or_else(|| file_artifact_id(&finding.file)),
        DriftType::Configuration => config_artifact_id(&finding.file),
    }
}

/// Canonical undirected pair key: `min(A,B) :: max(A,B)`.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}::{}", a, b)
    } else {
        format!("{}::{}", b, a)
    }
}

/// Split multi-endpoint / multi-entity findings into atomic findings so each
/// correlation references exactly one endpoint or table, then assign IDs.
///
/// Every endpoint/entity of a compound finding lands in exactly one expanded
/// finding.
pub fn expand_findings(findings: Vec<DriftFinding>) -> Vec<DriftFinding> {
    let mut out = Vec::with_capacity(findings.len());
    for finding in findings {
        match finding.drift_type {
            DriftType::Api if finding.endpoints.len() > 1 => {
                for endpoint in finding.endpoints.clone() {
                    let mut atom = finding.clone();
                    atom.endpoints = vec![endpoint];
                    atom.artifact_id = Some(artifact_id(&atom));
                    out.push(atom);
                }
            }
            DriftType::Database | DriftType::Infrastructure if finding.entities.len() > 1 => {
                for entity in finding.entities.clone() {
                    let mut atom = finding.clone();
                    atom.entities = vec![entity];
                    atom.artifact_id = Some(artifact_id(&atom));
                    out.push(atom);
                }
            }
            _ => {
                let mut atom = finding;
                atom.artifact_id = Some(artifact_id(&atom));
                out.push(atom);
            }
        }
    }
    out
}

/// Resolve a user-rule token against the known artifact IDs: exact match
/// first, then case-insensitive substring, then glob.
pub fn resolve_token(token: &str, ids: &[String]) -> Vec<String> {
    if is_glob(token) {
        // Artifact IDs are not paths; `*` here crosses `/` freely.
        if let Ok(glob) = Glob::new(&token.to_lowercase()) {
            let matcher = glob.compile_matcher();
            return ids
                .iter()
                .filter(|id| matcher.is_match(id.to_lowercase()))
                .cloned()
                .collect();
        }
        return Vec::new();
    }

    let exact: Vec<String> = ids
        .iter()
        .filter(|id| id.as_str() == token)
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let needle = token.to_lowercase();
    ids.iter()
        .filter(|id| id.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
