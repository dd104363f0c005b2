//! Config key extraction with secret redaction. Keys become dotted paths;
//! secret-bearing leaf keys are substituted with a redaction marker. Values
//! are never emitted.

use serde_json::Value;

/// Keyword categories; the marker carries the first three letters of the
/// matched category, uppercased.
const SECRET_CATEGORIES: &[(&str, &str)] = &[
    ("password", "PAS"),
    ("pwd", "PAS"),
    ("token", "TOK"),
    ("apikey", "API"),
    ("api_key", "API"),
    ("secret", "SEC"),
    ("credential", "CRE"),
    ("private_key", "CRE"),
];

pub fn secret_category(key: &str) -> Option<&'static str> {
    let lower = key.to_lowercase();
    SECRET_CATEGORIES
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, code)| *code)
}

fn leaf_key(key: &str) -> String {
    match secret_category(key) {
        Some(code) => format!("[REDACTED_{}]", code),
        None => key.to_string(),
    }
}

/// Flatten a parsed config tree into dotted key paths.
pub fn extract_keys(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect(value, "", &mut keys);
    keys
}

fn collect(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if child.is_object() && !child.as_object().map(|m| m.is_empty()).unwrap_or(true) {
                    let next = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    collect(child, &next, out);
                } else {
                    let leaf = leaf_key(key);
                    out.push(if prefix.is_empty() {
                        leaf
                    } else {
                        format!("{}.{}", prefix, leaf)
                    });
                }
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(prefix.to_string());
            }
        }
    }
}

pub struct KeyDiff {
    pub changes: Vec<String>,
}

/// Key-presence diff. Redacted paths surface as secret-key indicators.
pub fn diff_keys(base: &[String], head: &[String]) -> KeyDiff {
    let mut changes = Vec::new();
    for key in head {
        if !base.contains(key) {
            if key.contains("[REDACTED_") {
                changes.push(format!("SECRET_KEY_ADDED: {}", key));
            } else {
                changes.push(format!("CONFIG_KEY_ADDED: {}", key));
            }
        }
    }
    for key in base {
        if !head.contains(key) {
            if key.contains("[REDACTED_") {
                changes.push(format!("SECRET_KEY_REMOVED: {}", key));
            } else {
                changes.push(format!("CONFIG_KEY_REMOVED: {}", key));
            }
        }
    }
    KeyDiff { changes }
}
