//! Regex-only fallback for raw HCL when no plan JSON is available.

use once_cell::sync::Lazy;
use regex::Regex;

static RESOURCE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*resource\s+"([\w-]+)"\s+"([\w-]+)""#).unwrap());
static OPEN_CIDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"cidr_blocks\s*=\s*\[[^\]]*"0\.0\.0\.0/0""#).unwrap());
static LARGE_INSTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"instance_type\s*=\s*"([\w.]*(?:\d*xlarge|metal)[\w.]*)""#).unwrap()
});
static DELETION_PROTECTION_OFF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"deletion_protection\s*=\s*false").unwrap());
static UNENCRYPTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"encrypted\s*=\s*false").unwrap());
static PUBLIC_ACCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"publicly_accessible\s*=\s*true").unwrap());
static SKIP_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"skip_final_snapshot\s*=\s*true").unwrap());

pub struct HclScan {
    pub changes: Vec<String>,
    pub entities: Vec<String>,
}

pub fn scan_hcl(content: &str) -> HclScan {
    let mut changes = Vec::new();
    let mut entities = Vec::new();

    for caps in RESOURCE_BLOCK.captures_iter(content) {
        entities.push(format!("{}.{}", &caps[1], &caps[2]));
    }

    if OPEN_CIDR.is_match(content) {
        changes.push("OPEN_CIDR: cidr_blocks includes 0.0.0.0/0".to_string());
    }
    for caps in LARGE_INSTANCE.captures_iter(content) {
        changes.push(format!("LARGE_INSTANCE_TYPE: {}", &caps[1]));
    }
    if DELETION_PROTECTION_OFF.is_match(content) {
        changes.push("DELETION_PROTECTION_DISABLED: deletion_protection = false".to_string());
    }
    if UNENCRYPTED.is_match(content) {
        changes.push("ENCRYPTION_DISABLED: encrypted = false".to_string());
    }
    if PUBLIC_ACCESS.is_match(content) {
        changes.push("PUBLIC_ACCESS_ENABLED: publicly_accessible = true".to_string());
    }
    if SKIP_SNAPSHOT.is_match(content) {
        changes.push("SKIP_FINAL_SNAPSHOT: skip_final_snapshot = true".to_string());
    }

    HclScan { changes, entities }
}
