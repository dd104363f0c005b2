//! CloudFormation template diffing over `Resources` keyed by logical ID.

use serde_json::Value;

use super::cost::{cost_token, monthly_cost};
use super::properties::compare_properties;
use super::terraform::TerraformDiff;

fn is_security_group(resource_type: &str) -> bool {
    resource_type.eq_ignore_ascii_case("AWS::EC2::SecurityGroup")
}

/// Entity address for a logical resource: `aws_ec2_securitygroup.websg`.
pub fn cf_address(resource_type: &str, logical_id: &str) -> String {
    format!(
        "{}.{}",
        resource_type.to_lowercase().replace("::", "_"),
        logical_id.to_lowercase()
    )
}

fn resource_type(resource: &Value) -> String {
    resource
        .get("Type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

pub fn diff_templates(base: Option<&Value>, head: &Value, cost_threshold: f64) -> TerraformDiff {
    let empty = serde_json::Map::new();
    let base_resources = base
        .and_then(|b| b.get("Resources"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let head_resources = head
        .get("Resources")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut changes = Vec::new();
    let mut entities = Vec::new();
    let mut security_notes = Vec::new();
    let mut estimated_cost = 0.0;

    for (logical_id, resource) in head_resources {
        let head_type = resource_type(resource);
        let address = cf_address(&head_type, logical_id);
        match base_resources.get(logical_id) {
            None => {
                changes.push(format!("RESOURCE_ADDITION: {}", logical_id));
                if is_security_group(&head_type) {
                    changes.push(format!("SECURITY_GROUP_ADDITION: {}", logical_id));
                }
                estimated_cost += monthly_cost(&head_type);
                entities.push(address);
            }
            Some(base_resource) => {
                if base_resource == resource {
                    continue;
                }
                let base_type = resource_type(base_resource);
                if base_type != head_type {
                    changes.push(format!(
                        "RESOURCE_TYPE_CHANGE: {}: {} → {}",
                        logical_id, base_type, head_type
                    ));
                }
                let base_policy = base_resource.get("DeletionPolicy");
                let head_policy = resource.get("DeletionPolicy");
                if base_policy != head_policy {
                    changes.push(format!(
                        "DELETION_POLICY_CHANGE: {}: {} → {}",
                        logical_id,
                        base_policy.and_then(Value::as_str).unwrap_or("Retain"),
                        head_policy.and_then(Value::as_str).unwrap_or("Retain")
                    ));
                }
                if is_security_group(&head_type) {
                    changes.push(format!("SECURITY_GROUP_CHANGE: {}", logical_id));
                }
                let null = Value::Null;
                let base_props = base_resource.get("Properties").unwrap_or(&null);
                let head_props = resource.get("Properties").unwrap_or(&null);
                for change in compare_properties(logical_id, base_props, head_props) {
                    if change.security_sensitive {
                        security_notes.push(format!(
                            "Security-sensitive property changed: {}",
                            change.path
                        ));
                    }
                    changes.push(change.token);
                }
                entities.push(address);
            }
        }
    }

    for (logical_id, resource) in base_resources {
        if !head_resources.contains_key(logical_id) {
            let base_type = resource_type(resource);
            changes.push(format!("RESOURCE_DELETION: {}", logical_id));
            if is_security_group(&base_type) {
                changes.push(format!("SECURITY_GROUP_DELETION: {}", logical_id));
            }
            entities.push(cf_address(&base_type, logical_id));
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(resources: Value) -> Value {
        json!({"AWSTemplateFormatVersion": "2010-09-09", "Resources": resources})
    }

    #[test]
    fn deletion_policy_change_is_reported() {
        let base = template(json!({
            "Db": {"Type": "AWS::RDS::DBInstance", "DeletionPolicy": "Snapshot", "Properties": {}}
        }));
        let head = template(json!({
            "Db": {"Type": "AWS::RDS::DBInstance", "DeletionPolicy": "Delete", "Properties": {}}
        }));
        let diff = diff_templates(Some(&base), &head, 1000.0);
        assert!(diff
            .changes
            .contains(&"DELETION_POLICY_CHANGE: Db: Snapshot → Delete".to_string()));
    }

    #[test]
    fn type_change_is_reported() {
        let base = template(json!({
            "Store": {"Type": "AWS::S3::Bucket", "Properties": {}}
        }));
        let head = template(json!({
            "Store": {"Type": "AWS::EFS::FileSystem", "Properties": {}}
        }));
        let diff = diff_templates(Some(&base), &head, 1000.0);
        assert!(diff
            .changes
            .contains(&"RESOURCE_TYPE_CHANGE: Store: AWS::S3::Bucket → AWS::EFS::FileSystem".to_string()));
    }

    #[test]
    fn security_group_ingress_widening_is_flagged() {
        let sg = |cidr: &str| {
            json!({"Type": "AWS::EC2::SecurityGroup", "Properties": {
                "SecurityGroupIngress": [
                    {"IpProtocol": "tcp", "FromPort": 443, "ToPort": 443, "CidrIp": cidr}
                ]}})
        };
        let base = template(json!({"WebSg": sg("10.0.0.0/8")}));
        let head = template(json!({"WebSg": sg("0.0.0.0/0")}));
        let diff = diff_templates(Some(&base), &head, 1000.0);
        assert!(diff
            .changes
            .contains(&"SECURITY_GROUP_CHANGE: WebSg".to_string()));
        assert!(diff.changes.iter().any(|c| c.contains("CidrIp") && c.contains("0.0.0.0/0")));
    }

    #[test]
    fn new_template_counts_cost() {
        let head = template(json!({
            "Cluster": {"Type": "AWS::EKS::Cluster", "Properties": {}},
            "Nat": {"Type": "AWS::EC2::NatGateway", "Properties": {}}
        }));
        let diff = diff_templates(None, &head, 100.0);
        assert_eq!(diff.cost_impact, Some(195.0));
    }
}
