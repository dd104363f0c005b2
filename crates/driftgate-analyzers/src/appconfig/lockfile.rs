//! Lockfile diffing over the two schema shapes in the wild: a `dependencies`
//! map (v1) or a `packages` map keyed by install path (v2/v3).

use std::collections::BTreeMap;

use serde_json::Value;

use super::manifest::is_vulnerable;
use super::version::{classify_bump, Bump};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    pub version: String,
    pub integrity: Option<String>,
}

/// Flatten either lockfile shape into `name -> {version, integrity}`.
pub fn locked_packages(lockfile: &Value) -> BTreeMap<String, LockedPackage> {
    let mut packages = BTreeMap::new();

    if let Some(map) = lockfile.get("packages").and_then(Value::as_object) {
        for (install_path, entry) in map {
            if install_path.is_empty() {
                continue; // the root project entry
            }
            let name = install_path
                .rsplit("node_modules/")
                .next()
                .unwrap_or(install_path);
            insert_entry(&mut packages, name, entry);
        }
        return packages;
    }

    if let Some(map) = lockfile.get("dependencies").and_then(Value::as_object) {
        for (name, entry) in map {
            insert_entry(&mut packages, name, entry);
            // v1 nests transitive dependencies.
            collect_nested(entry, &mut packages);
        }
    }
    packages
}

fn collect_nested(entry: &Value, packages: &mut BTreeMap<String, LockedPackage>) {
    if let Some(nested) = entry.get("dependencies").and_then(Value::as_object) {
        for (name, child) in nested {
            insert_entry(packages, name, child);
            collect_nested(child, packages);
        }
    }
}

fn insert_entry(packages: &mut BTreeMap<String, LockedPackage>, name: &str, entry: &Value) {
    let Some(version) = entry.get("version").and_then(Value::as_str) else {
        return;
    };
    packages.insert(
        name.to_string(),
        LockedPackage {
            version: version.to_string(),
            integrity: entry
                .get("integrity")
                .and_then(Value::as_str)
                .map(String::from),
        },
    );
}

pub fn diff_lockfiles(path: &str, base: Option<&Value>, head: &Value) -> Vec<String> {
    let mut changes = Vec::new();

    let Some(base) = base else {
        changes.push(format!("NEW_LOCK_FILE: {} created", path));
        return changes;
    };

    let base_packages = locked_packages(base);
    let head_packages = locked_packages(head);

    let mut version_changed = 0usize;
    let mut integrity_mismatches = 0usize;
    let mut major_bumps: Vec<&String> = Vec::new();
    let mut vulnerable: Vec<&String> = Vec::new();

    for (name, head_pkg) in &head_packages {
        match base_packages.get(name) {
            None => {
                version_changed += 1;
                if is_vulnerable(name, &head_pkg.version) {
                    vulnerable.push(name);
                }
            }
            Some(base_pkg) if base_pkg.version != head_pkg.version => {
                version_changed += 1;
                if classify_bump(&base_pkg.version, &head_pkg.version) == Bump::Major {
                    major_bumps.push(name);
                }
                if is_vulnerable(name, &head_pkg.version) {
                    vulnerable.push(name);
                }
            }
            Some(base_pkg) => {
                // Same version, different checksum: the package content moved
                // under our feet.
                if base_pkg.integrity.is_some()
                    && head_pkg.integrity.is_some()
                    && base_pkg.integrity != head_pkg.integrity
                {
                    integrity_mismatches += 1;
                }
            }
        }
    }
    for name in base_packages.keys() {
        if !head_packages.contains_key(name) {
            version_changed += 1;
        }
    }

    if version_changed > 0 {
        changes.push(format!(
            "TRANSITIVE_DEPENDENCIES_CHANGED: {} packages",
            version_changed
        ));
    }
    for name in major_bumps {
        changes.push(format!("TRANSITIVE_MAJOR_BUMP: {}", name));
    }
    if integrity_mismatches > 0 {
        changes.push(format!(
            "INTEGRITY_MISMATCH: {} packages have different checksums",
            integrity_mismatches
        ));
    }
    for name in vulnerable {
        changes.push(format!("SECURITY_VULNERABILITY: {}", name));
    }

    changes
}
