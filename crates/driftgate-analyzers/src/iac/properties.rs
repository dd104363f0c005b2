//! Deep property comparison shared by the Terraform and CloudFormation
//! paths, including fingerprint matching for arrays of security rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::loader::value_token;

static SENSITIVE_PATH: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)security",
        r"(?i)cidr",
        r"(?i)ingress",
        r"(?i)egress",
        r"(?i)port",
        r"(?i)public",
        r"(?i)deletion",
        r"(?i)policy",
        r"(?i)role",
        r"(?i)permission",
        r"(?i)encrypt",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub token: String,
    pub path: String,
    pub security_sensitive: bool,
}

fn sensitive(path: &str, new_value: Option<&Value>) -> bool {
    if SENSITIVE_PATH.iter().any(|re| re.is_match(path)) {
        return true;
    }
    new_value
        .map(|v| v.to_string().contains("0.0.0.0/0"))
        .unwrap_or(false)
}

fn push_modified(
    out: &mut Vec<PropertyChange>,
    resource_id: &str,
    path: &str,
    before: &Value,
    after: &Value,
) {
    out.push(PropertyChange {
        token: format!(
            "PROPERTY_MODIFIED: {}.{}: {} → {}",
            resource_id,
            path,
            value_token(before),
            value_token(after)
        ),
        path: path.to_string(),
        security_sensitive: sensitive(path, Some(after)),
    });
}

/// Compare two property trees of one resource, producing one change per
/// differing leaf.
pub fn compare_properties(
    resource_id: &str,
    base: &Value,
    head: &Value,
) -> Vec<PropertyChange> {
    let mut out = Vec::new();
    walk(resource_id, "", base, head, &mut out);
    out
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn walk(resource_id: &str, path: &str, base: &Value, head: &Value, out: &mut Vec<PropertyChange>) {
    match (base, head) {
        (Value::Object(base_map), Value::Object(head_map)) => {
            for (key, base_value) in base_map {
                let child = join(path, key);
                match head_map.get(key) {
                    Some(head_value) => walk(resource_id, &child, base_value, head_value, out),
                    None => out.push(PropertyChange {
                        token: format!("PROPERTY_REMOVED: {}.{}", resource_id, child),
                        path: child.clone(),
                        security_sensitive: sensitive(&child, None),
                    }),
                }
            }
            for key in head_map.keys() {
                if !base_map.contains_key(key) {
                    let child = join(path, key);
                    out.push(PropertyChange {
                        token: format!("PROPERTY_ADDED: {}.{}", resource_id, child),
                        security_sensitive: sensitive(&child, head_map.get(key)),
                        path: child,
                    });
                }
            }
        }
        (Value::Array(base_items), Value::Array(head_items)) => {
            if is_rule_array(base_items) || is_rule_array(head_items) {
                diff_rule_array(resource_id, path, base_items, head_items, out);
            } else if base != head {
                push_modified(out, resource_id, path, base, head);
            }
        }
        _ => {
            if base != head {
                push_modified(out, resource_id, path, base, head);
            }
        }
    }
}

fn rule_field<'a>(item: &'a Value, snake: &str, pascal: &str) -> Option<&'a Value> {
    item.get(snake).or_else(|| item.get(pascal))
}

/// Matching fingerprint for rule-shaped objects: protocol + port range,
/// CIDR excluded so a CIDR edit still matches the same rule.
pub fn rule_fingerprint(item: &Value) -> Option<String> {
    let protocol = rule_field(item, "protocol", "IpProtocol")?;
    let from = rule_field(item, "from_port", "FromPort")?;
    let to = rule_field(item, "to_port", "ToPort")?;
    Some(format!(
        "{}-{}-{}",
        value_token(protocol),
        value_token(from),
        value_token(to)
    ))
}

/// First CIDR of a rule, from either schema shape.
pub fn first_cidr(item: &Value) -> Option<String> {
    if let Some(blocks) = rule_field(item, "cidr_blocks", "CidrBlocks").and_then(Value::as_array) {
        return blocks.first().map(value_token);
    }
    rule_field(item, "cidr_ip", "CidrIp").map(value_token)
}

fn is_rule_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|i| rule_fingerprint(i).is_some())
}

fn cidr_key(item: &Value) -> &'static str {
    if item.get("CidrIp").is_some() {
        "CidrIp"
    } else {
        "cidr_blocks"
    }
}

fn description_of(item: &Value) -> Option<&Value> {
    rule_field(item, "description", "Description")
}

fn diff_rule_array(
    resource_id: &str,
    path: &str,
    base_items: &[Value],
    head_items: &[Value],
    out: &mut Vec<PropertyChange>,
) {
    let base_fps: Vec<Option<String>> = base_items.iter().map(rule_fingerprint).collect();
    let head_fps: Vec<Option<String>> = head_items.iter().map(rule_fingerprint).collect();

    for (i, (item, fp)) in base_items.iter().zip(&base_fps).enumerate() {
        let Some(fp) = fp else { continue };
        let Some(head_index) = head_fps.iter().position(|h| h.as_ref() == Some(fp)) else {
            out.push(PropertyChange {
                token: format!("PROPERTY_REMOVED: {}.{}[{}]", resource_id, path, i),
                path: format!("{}[{}]", path, i),
                security_sensitive: sensitive(path, None),
            });
            continue;
        };

        let head_item = &head_items[head_index];
        if item == head_item {
            continue;
        }

        let indexed = format!("{}[{}]", path, head_index);
        let mut emitted = false;
        if first_cidr(item) != first_cidr(head_item) {
            let key = cidr_key(head_item);
            let empty = Value::Null;
            let before = rule_field(item, "cidr_blocks", "CidrIp").unwrap_or(&empty);
            let after = rule_field(head_item, "cidr_blocks", "CidrIp").unwrap_or(&empty);
            push_modified(out, resource_id, &format!("{}.{}", indexed, key), before, after);
            emitted = true;
        }
        if description_of(item) != description_of(head_item) {
            let empty = Value::Null;
            push_modified(
                out,
                resource_id,
                &format!("{}.description", indexed),
                description_of(item).unwrap_or(&empty),
                description_of(head_item).unwrap_or(&empty),
            );
            emitted = true;
        }
        if !emitted {
            out.push(PropertyChange {
                token: format!(
                    "PROPERTY_MODIFIED: {}.{}: rule properties changed",
                    resource_id, indexed
                ),
                path: indexed.clone(),
                security_sensitive: sensitive(path, Some(head_item)),
            });
        }
    }

    for (i, fp) in head_fps.iter().enumerate() {
        let Some(fp) = fp else { continue };
        if !base_fps.iter().any(|b| b.as_ref() == Some(fp)) {
            out.push(PropertyChange {
                token: format!("PROPERTY_ADDED: {}.{}[{}]", resource_id, path, i),
                path: format!("{}[{}]", path, i),
                security_sensitive: sensitive(path, Some(&head_items[i])),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_difference_emits_modified_token() {
        let changes = compare_properties(
            "aws_db_instance.main",
            &json!({"instance_class": "db.t3.micro"}),
            &json!({"instance_class": "db.t3.large"}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].token,
            "PROPERTY_MODIFIED: aws_db_instance.main.instance_class: \"db.t3.micro\" → \"db.t3.large\""
        );
        assert!(!changes[0].security_sensitive);
    }

    #[test]
    fn added_and_removed_keys_are_reported() {
        let changes = compare_properties(
            "r.x",
            &json!({"a": 1, "b": 2}),
            &json!({"b": 2, "c": 3}),
        );
        let tokens: Vec<&str> = changes.iter().map(|c| c.token.as_str()).collect();
        assert!(tokens.contains(&"PROPERTY_REMOVED: r.x.a"));
        assert!(tokens.contains(&"PROPERTY_ADDED: r.x.c"));
    }

    #[test]
    fn cidr_widening_matches_rule_by_fingerprint() {
        let base = json!({"ingress": [
            {"protocol": "tcp", "from_port": 443, "to_port": 443, "cidr_blocks": ["10.0.0.0/8"]}
        ]});
        let head = json!({"ingress": [
            {"protocol": "tcp", "from_port": 443, "to_port": 443, "cidr_blocks": ["0.0.0.0/0"]}
        ]});
        let changes = compare_properties("aws_security_group.web", &base, &head);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].token,
            "PROPERTY_MODIFIED: aws_security_group.web.ingress[0].cidr_blocks: [\"10.0.0.0/8\"] → [\"0.0.0.0/0\"]"
        );
        assert!(changes[0].security_sensitive);
    }

    #[test]
    fn unmatched_fingerprints_are_added_or_removed() {
        let base = json!({"ingress": [
            {"protocol": "tcp", "from_port": 22, "to_port": 22, "cidr_blocks": ["10.0.0.0/8"]}
        ]});
        let head = json!({"ingress": [
            {"protocol": "tcp", "from_port": 80, "to_port": 80, "cidr_blocks": ["10.0.0.0/8"]}
        ]});
        let changes = compare_properties("sg.web", &base, &head);
        let tokens: Vec<&str> = changes.iter().map(|c| c.token.as_str()).collect();
        assert!(tokens.contains(&"PROPERTY_REMOVED: sg.web.ingress[0]"));
        assert!(tokens.contains(&"PROPERTY_ADDED: sg.web.ingress[0]"));
    }

    #[test]
    fn pascal_case_rules_are_recognized() {
        let base = json!({"SecurityGroupIngress": [
            {"IpProtocol": "tcp", "FromPort": 443, "ToPort": 443, "CidrIp": "10.0.0.0/8"}
        ]});
        let head = json!({"SecurityGroupIngress": [
            {"IpProtocol": "tcp", "FromPort": 443, "ToPort": 443, "CidrIp": "0.0.0.0/0"}
        ]});
        let changes = compare_properties("WebSg", &base, &head);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].token.contains("SecurityGroupIngress[0].CidrIp"));
        assert!(changes[0].security_sensitive);
    }

    #[test]
    fn rule_fallback_when_only_metadata_changed() {
        let base = json!({"ingress": [
            {"protocol": "tcp", "from_port": 443, "to_port": 443, "cidr_blocks": ["10.0.0.0/8"], "self": false}
        ]});
        let head = json!({"ingress": [
            {"protocol": "tcp", "from_port": 443, "to_port": 443, "cidr_blocks": ["10.0.0.0/8"], "self": true}
        ]});
        let changes = compare_properties("sg.web", &base, &head);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].token.ends_with("rule properties changed"));
    }

    #[test]
    fn nested_objects_recurse_with_dotted_paths() {
        let changes = compare_properties(
            "r.y",
            &json!({"tags": {"env": "dev"}}),
            &json!({"tags": {"env": "prod"}}),
        );
        assert_eq!(
            changes[0].token,
            "PROPERTY_MODIFIED: r.y.tags.env: \"dev\" → \"prod\""
        );
    }
}
