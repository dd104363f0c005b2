//! Package manifest diffing: dependency add/remove, version bump semantics,
//! the transparent vulnerability list, deprecations, and license changes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use super::version::{classify_bump, compare_versions, strip_prefix, Bump};

/// Version predicate for the fixed vulnerability rules.
#[derive(Debug, Clone, Copy)]
pub enum VersionRule {
    Any,
    Exact(&'static str),
    Below(&'static str),
}

/// Deliberately tiny and transparent. Expansion belongs behind an explicit
/// configuration surface, not here.
pub const KNOWN_VULNERABILITIES: &[(&str, VersionRule)] = &[
    ("event-stream", VersionRule::Any),
    ("flatmap-stream", VersionRule::Any),
    ("eslint-scope", VersionRule::Exact("3.7.2")),
    ("bootstrap", VersionRule::Below("3.4.0")),
    ("lodash", VersionRule::Below("4.17.11")),
];

pub const DEPRECATED_PACKAGES: &[&str] = &["request", "node-sass", "gulp-util", "left-pad"];

pub fn is_vulnerable(name: &str, version: &str) -> bool {
    KNOWN_VULNERABILITIES.iter().any(|(vuln, rule)| {
        if *vuln != name {
            return false;
        }
        match rule {
            VersionRule::Any => true,
            VersionRule::Exact(v) => strip_prefix(version) == *v,
            VersionRule::Below(v) => compare_versions(version, v) == Ordering::Less,
        }
    })
}

/// Declared dependencies, runtime and dev merged.
pub fn dependencies(manifest: &Value) -> BTreeMap<String, String> {
    let mut deps = BTreeMap::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = manifest.get(section).and_then(Value::as_object) {
            for (name, version) in map {
                if let Some(version) = version.as_str() {
                    deps.insert(name.clone(), version.to_string());
                }
            }
        }
    }
    deps
}

pub fn diff_manifests(base: Option<&Value>, head: &Value) -> Vec<String> {
    let base_deps = base.map(dependencies).unwrap_or_default();
    let head_deps = dependencies(head);
    let mut changes = Vec::new();
    let mut vulnerable: Vec<&str> = Vec::new();

    for (name, head_version) in &head_deps {
        match base_deps.get(name) {
            None => {
                changes.push(format!("DEPENDENCY_ADDED: {}@{}", name, head_version));
                if is_vulnerable(name, head_version) {
                    vulnerable.push(name);
                }
                if DEPRECATED_PACKAGES.contains(&name.as_str()) {
                    changes.push(format!("DEPRECATED_PACKAGE: {}", name));
                }
            }
            Some(base_version) if base_version != head_version => {
                match classify_bump(base_version, head_version) {
                    Bump::Major => changes.push(format!(
                        "MAJOR_VERSION_BUMP: {} ({} -> {})",
                        name, base_version, head_version
                    )),
                    Bump::Minor => changes.push(format!(
                        "MINOR_VERSION_BUMP: {} ({} -> {})",
                        name, base_version, head_version
                    )),
                    Bump::Patch => changes.push(format!(
                        "PATCH: {} ({} -> {})",
                        name, base_version, head_version
                    )),
                    Bump::None => {}
                }
                if is_vulnerable(name, head_version) {
                    vulnerable.push(name);
                }
                if DEPRECATED_PACKAGES.contains(&name.as_str()) {
                    changes.push(format!("DEPRECATED_PACKAGE: {}", name));
                }
            }
            Some(_) => {}
        }
    }
    for name in base_deps.keys() {
        if !head_deps.contains_key(name) {
            changes.push(format!("DEPENDENCY_REMOVED: {}", name));
        }
    }

    for name in &vulnerable {
        changes.push(format!("SECURITY_VULNERABILITY: {}", name));
    }
    if !vulnerable.is_empty() {
        changes.push(
            "SECURITY_RECOMMENDATION: run a full dependency audit (npm audit) for complete coverage"
                .to_string(),
        );
    }

    let base_license = base
        .and_then(|b| b.get("license"))
        .and_then(Value::as_str);
    let head_license = head.get("license").and_then(Value::as_str);
    if let (Some(old), Some(new)) = (base_license, head_license) {
        if old != new {
            changes.push(format!("LICENSE_CHANGE: {} -> {}", old, new));
        }
    }

    changes
}
