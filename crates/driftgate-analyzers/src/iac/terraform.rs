//! Terraform plan diffing: resource-graph comparison between the base and
//! head plan JSON documents.

use std::collections::BTreeMap;

use serde_json::Value;

use super::cost::{cost_token, monthly_cost};
use super::properties::compare_properties;

#[derive(Debug, Clone)]
pub struct TfResource {
    pub address: String,
    pub resource_type: String,
    pub actions: Vec<String>,
    pub before: Value,
    pub after: Value,
}

pub struct TerraformDiff {
    pub changes: Vec<String>,
    pub entities: Vec<String>,
    pub security_notes: Vec<String>,
    pub cost_impact: Option<f64>,
}

fn is_security_group(resource_type: &str) -> bool {
    let lower = resource_type.to_lowercase();
    lower.contains("security_group") || lower.contains("firewall")
}

/// Index a plan document by resource address.
pub fn plan_resources(plan: &Value) -> BTreeMap<String, TfResource> {
    let mut resources = BTreeMap::new();
    let Some(items) = plan.get("resource_changes").and_then(Value::as_array) else {
        return resources;
    };
    for item in items {
        let Some(address) = item.get("address").and_then(Value::as_str) else {
            continue;
        };
        let resource_type = item
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_else(|| address.split('.').next().unwrap_or(address))
            .to_string();
        let change = item.get("change").cloned().unwrap_or(Value::Null);
        let actions = change
            .get("actions")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        resources.insert(
            address.to_string(),
            TfResource {
                address: address.to_string(),
                resource_type,
                actions,
                before: change.get("before").cloned().unwrap_or(Value::Null),
                after: change.get("after").cloned().unwrap_or(Value::Null),
            },
        );
    }
    resources
}

pub fn diff_plans(base: Option<&Value>, head: &Value, cost_threshold: f64) -> TerraformDiff {
    let base_resources = base.map(plan_resources).unwrap_or_default();
    let head_resources = plan_resources(head);

    let mut changes = Vec::new();
    let mut entities = Vec::new();
    let mut security_notes = Vec::new();
    let mut estimated_cost = 0.0;

    for (address, resource) in &head_resources {
        if !base_resources.contains_key(address) {
            changes.push(format!("RESOURCE_ADDITION: {}", address));
            if is_security_group(&resource.resource_type) {
                changes.push(format!("SECURITY_GROUP_ADDITION: {}", address));
            }
            estimated_cost += monthly_cost(&resource.resource_type);
            entities.push(address.clone());
            continue;
        }

        let updated = resource
            .actions
            .iter()
            .any(|a| a == "update" || a == "modify");
        if updated {
            if is_security_group(&resource.resource_type) {
                changes.push(format!("SECURITY_GROUP_CHANGE: {}", address));
            }
            for change in compare_properties(address, &resource.before, &resource.after) {
                if change.security_sensitive {
                    security_notes
                        .push(format!("Security-sensitive property changed: {}", change.path));
                }
                changes.push(change.token);
            }
            entities.push(address.clone());
        }
        if resource.actions.iter().any(|a| a == "create") {
            estimated_cost += monthly_cost(&resource.resource_type);
        }
    }

    for (address, resource) in &base_resources {
        if !head_resources.contains_key(address) {
            changes.push(format!("RESOURCE_DELETION: {}", address));
            if is_security_group(&resource.resource_type) {
                changes.push(format!("SECURITY_GROUP_DELETION: {}", address));
            }
            entities.push(address.clone());
        }
    }

    let cost_impact = if estimated_cost > cost_threshold {
        changes.push(cost_token(estimated_cost));
        Some(estimated_cost)
    } else {
        None
    };

    TerraformDiff {
        changes,
        entities,
        security_notes,
        cost_impact,
    }
}
