//! Shared structured-document loading for analyzers that accept JSON or YAML.

use serde_json::Value;
use tracing::warn;

/// Parse text as JSON when the first non-whitespace character is `{`,
/// otherwise as YAML. Returns `None` (with a warning) when neither parse
/// succeeds; callers treat that as "not present".
pub fn parse_document(path: &str, text: &str) -> Option<Value> {
    let first = text.chars().find(|c| !c.is_whitespace())?;
    let parsed: Result<Value, String> = if first == '{' {
        serde_json::from_str(text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    };
    match parsed {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(path, %error, "failed to parse document; skipping");
            None
        }
    }
}

/// Render a value the way it appears in change tokens (compact JSON).
pub fn value_token(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autodetects_json_by_leading_brace() {
        let value = parse_document("x.json", r#"  {"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn falls_back_to_yaml() {
        let value = parse_document("x.yaml", "a: 1\nb:\n  - x\n").unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"][0], "x");
    }

    #[test]
    fn unparseable_content_yields_none() {
        assert!(parse_document("x.json", "{not json").is_none());
        assert!(parse_document("x.yaml", ": : :\n\t-").is_none());
    }
}
