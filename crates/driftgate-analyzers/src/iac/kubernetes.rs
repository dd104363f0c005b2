//! Kubernetes manifest checks over parsed YAML documents.

use serde_json::Value;

pub struct ManifestScan {
    pub changes: Vec<String>,
    pub entities: Vec<String>,
}

/// A document is a Kubernetes manifest when it carries both `apiVersion`
/// and `kind`.
pub fn is_manifest(doc: &Value) -> bool {
    doc.get("apiVersion").is_some() && doc.get("kind").is_some()
}

fn name_of(doc: &Value) -> String {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unnamed")
        .to_string()
}

pub fn scan_manifest(doc: &Value) -> ManifestScan {
    let mut changes = Vec::new();
    let kind = doc
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let name = name_of(doc);
    let entity = format!("{}/{}", kind.to_lowercase(), name.to_lowercase());

    if kind.eq_ignore_ascii_case("Service")
        && doc
            .get("spec")
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            == Some("LoadBalancer")
    {
        changes.push(format!("SERVICE_TYPE_LOADBALANCER: {}", entity));
    }

    if doc
        .get("spec")
        .and_then(|s| s.get("replicas"))
        .and_then(Value::as_u64)
        == Some(0)
    {
        changes.push(format!("REPLICAS_ZERO: {}", entity));
    }

    let pod_spec = doc
        .get("spec")
        .and_then(|s| s.get("template"))
        .and_then(|t| t.get("spec"))
        .or_else(|| doc.get("spec").filter(|s| s.get("containers").is_some()));

    if let Some(pod) = pod_spec {
        if pod.get("hostNetwork").and_then(Value::as_bool) == Some(true) {
            changes.push(format!("HOST_NETWORK_ENABLED: {}", entity));
        }
        if let Some(containers) = pod.get("containers").and_then(Value::as_array) {
            for container in containers {
                let cname = container
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("container");
                if container.get("resources").map(is_empty_value).unwrap_or(true) {
                    changes.push(format!(
                        "CONTAINER_NO_RESOURCE_LIMITS: {}/{}",
                        entity, cname
                    ));
                }
                if container
                    .get("securityContext")
                    .and_then(|c| c.get("privileged"))
                    .and_then(Value::as_bool)
                    == Some(true)
                {
                    changes.push(format!("PRIVILEGED_CONTAINER: {}/{}", entity, cname));
                }
            }
        }
    }

    ManifestScan {
        changes,
        entities: vec![entity],
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
