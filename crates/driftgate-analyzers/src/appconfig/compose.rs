//! Docker-compose service diff and feature-flag boolean diff.

use serde_json::Value;

pub fn diff_services(base: Option<&Value>, head: Option<&Value>) -> Vec<String> {
    let empty = serde_json::Map::new();
    let base_services = base
        .and_then(|b| b.get("services"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let head_services = head
        .and_then(|h| h.get("services"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut changes = Vec::new();
    for name in head_services.keys() {
        if !base_services.contains_key(name) {
            changes.push(format!("CONTAINER_ADDED: {}", name));
        }
    }
    for name in base_services.keys() {
        if !head_services.contains_key(name) {
            changes.push(format!("CONTAINER_REMOVED: {}", name));
        }
    }
    changes
}

/// Collect dotted paths of boolean-valued keys.
fn boolean_flags(value: &Value, prefix: &str, out: &mut Vec<(String, bool)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                boolean_flags(child, &path, out);
            }
        }
        Value::Bool(flag) => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), *flag));
            }
        }
        _ => {}
    }
}

pub fn diff_feature_flags(base: Option<&Value>, head: Option<&Value>) -> Vec<String> {
    let mut base_flags = Vec::new();
    let mut head_flags = Vec::new();
    if let Some(base) = base {
        boolean_flags(base, "", &mut base_flags);
    }
    if let Some(head) = head {
        boolean_flags(head, "", &mut head_flags);
    }

    let mut changes = Vec::new();
    for (name, value) in &head_flags {
        match base_flags.iter().find(|(n, _)| n == name) {
            None => changes.push(format!("FEATURE_FLAG_ADDED: {}", name)),
            Some((_, old)) if old != value => {
                changes.push(format!("FEATURE_FLAG_TOGGLED: {} ({} -> {})", name, old, value))
            }
            Some(_) => {}
        }
    }
    for (name, _) in &base_flags {
        if !head_flags.iter().any(|(n, _)| n == name) {
            changes.push(format!("FEATURE_FLAG_REMOVED: {}", name));
        }
    }
    changes
}
