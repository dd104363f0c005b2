//! SQL migration analyzer: pattern-driven destructive-change detection with
//! DML filtering and table/column rename heuristics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use driftgate_core::risk::score_changes;
use driftgate_core::sqlpat;
use driftgate_core::{
    glob_match, AnalyzeContext, DriftAnalyzer, DriftConfig, DriftFinding, DriftType, FileStatus,
    FindingMetadata, RenameInfo, Result,
};

pub struct SqlAnalyzer;

#[async_trait]
impl DriftAnalyzer for SqlAnalyzer {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn can_handle(&self, path: &str, config: &DriftConfig) -> bool {
        glob_match(&config.sql_glob, path)
    }

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>> {
        let targets: Vec<String> = ctx
            .change_set
            .files
            .iter()
            .filter(|f| f.status != FileStatus::Removed)
            .filter(|f| self.can_handle(&f.path, ctx.config))
            .map(|f| f.path.clone())
            .collect();

        let fan_out = ctx.config.fetch_fan_out.max(1);
        let fetched: Vec<(String, Option<String>)> = stream::iter(targets)
            .map(|path| async move {
                let content = ctx.fetch_text(&path, &ctx.change_set.head_ref).await;
                (path, content.unwrap_or_default())
            })
            .buffer_unordered(fan_out)
            .collect()
            .await;

        let mut findings = Vec::new();
        for (path, content) in fetched {
            let Some(content) = content else { continue };
            if sqlpat::is_dml_only(&content) {
                info!(path = %path, "skipping DML-only migration");
                continue;
            }
            if let Some(finding) = analyze_migration(&path, &content) {
                findings.push(finding);
            }
        }
        debug!(findings = findings.len(), "sql analysis complete");
        Ok(findings)
    }
}

#[derive(Default)]
struct TableStats {
    dropped_columns: Vec<String>,
    added_columns: Vec<String>,
}

/// Words that can follow `ADD` without being a column name.
fn is_add_keyword(word: &str) -> bool {
    matches!(
        word.to_uppercase().as_str(),
        "CONSTRAINT" | "PRIMARY" | "FOREIGN" | "UNIQUE" | "CHECK" | "INDEX" | "COLUMN"
    )
}

/// Bounded target types read as narrowing when a column type changes.
fn is_narrowing_type(type_name: &str) -> bool {
    let upper = type_name.trim().to_uppercase();
    upper.starts_with("SMALLINT")
        || upper.starts_with("TINYINT")
        || upper.starts_with("INT")
        || upper.starts_with("INTEGER")
        || upper.starts_with("VARCHAR(")
        || upper.starts_with("VARCHAR (")
        || upper.starts_with("CHAR(")
        || upper.starts_with("CHAR (")
}

/// Table context for a match position: the last `ALTER TABLE <name>` that
/// begins before it.
fn enclosing_table(content: &str, position: usize) -> Option<String> {
    sqlpat::ALTER_TABLE
        .captures_iter(content)
        .filter(|caps| caps.get(0).map(|m| m.start() <= position).unwrap_or(false))
        .last()
        .map(|caps| sqlpat::clean_identifier(&caps[1]))
}

pub fn analyze_migration(path: &str, content: &str) -> Option<DriftFinding> {
    let mut changes: Vec<String> = Vec::new();
    let mut dropped_tables: Vec<String> = Vec::new();
    let mut created_tables: Vec<String> = Vec::new();
    let mut stats: BTreeMap<String, TableStats> = BTreeMap::new();

    for caps in sqlpat::DROP_TABLE.captures_iter(content) {
        let table = sqlpat::clean_identifier(&caps[1]);
        changes.push(format!("DROP TABLE: {}", table));
        if !dropped_tables.contains(&table) {
            dropped_tables.push(table);
        }
    }
    for caps in sqlpat::CREATE_TABLE.captures_iter(content) {
        let table = sqlpat::clean_identifier(&caps[1]);
        if !created_tables.contains(&table) {
            created_tables.push(table);
        }
    }
    for caps in sqlpat::TRUNCATE_TABLE.captures_iter(content) {
        let table = sqlpat::clean_identifier(&caps[1]);
        if table != "table" {
            changes.push(format!("TRUNCATE TABLE: {}", table));
        }
    }

    for caps in sqlpat::DROP_COLUMN.captures_iter(content) {
        let column = sqlpat::clean_identifier(&caps[1]);
        let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let table = enclosing_table(content, position).unwrap_or_else(|| "unknown".into());
        changes.push(format!("DROP COLUMN: {}.{}", table, column));
        stats.entry(table).or_default().dropped_columns.push(column);
    }
    for caps in sqlpat::ADD_COLUMN.captures_iter(content) {
        let column = sqlpat::clean_identifier(&caps[1]);
        if is_add_keyword(&column) {
            continue;
        }
        let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
        if let Some(table) = enclosing_table(content, position) {
            stats.entry(table).or_default().added_columns.push(column);
        }
    }

    for caps in sqlpat::DROP_CONSTRAINT.captures_iter(content) {
        changes.push(format!(
            "DROP CONSTRAINT: {}",
            sqlpat::clean_identifier(&caps[1])
        ));
    }
    for caps in sqlpat::ADD_CONSTRAINT.captures_iter(content) {
        changes.push(format!(
            "ADD CONSTRAINT: {}",
            sqlpat::clean_identifier(&caps[1])
        ));
    }
    for caps in sqlpat::POLICY.captures_iter(content) {
        changes.push(format!(
            "{} POLICY: {}",
            caps[1].to_uppercase(),
            sqlpat::clean_identifier(&caps[2])
        ));
    }

    for caps in sqlpat::ALTER_COLUMN_TYPE.captures_iter(content) {
        let column = sqlpat::clean_identifier(&caps[1]);
        let new_type = caps[2].trim().to_string();
        let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let table = enclosing_table(content, position).unwrap_or_else(|| "unknown".into());
        if is_narrowing_type(&new_type) {
            changes.push(format!(
                "TYPE NARROWING: {}.{} -> {}",
                table,
                column,
                new_type.to_uppercase()
            ));
        }
    }
    for caps in sqlpat::SET_NOT_NULL.captures_iter(content) {
        let column = sqlpat::clean_identifier(&caps[1]);
        let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let table = enclosing_table(content, position).unwrap_or_else(|| "unknown".into());
        changes.push(format!("NOT NULL: {}.{}", table, column));
    }
    for caps in sqlpat::ADD_NOT_NULL_COLUMN.captures_iter(content) {
        let column = sqlpat::clean_identifier(&caps[1]);
        if is_add_keyword(&column) {
            continue;
        }
        let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let table = enclosing_table(content, position).unwrap_or_else(|| "unknown".into());
        changes.push(format!("NOT NULL: {}.{}", table, column));
    }

    // Table rename heuristic: DROP + CREATE of the same name is a schema
    // rewrite, not a loss. Still high; schema may differ.
    let mut renamed: Option<RenameInfo> = None;
    for table in dropped_tables.clone() {
        if created_tables.contains(&table) {
            changes.retain(|c| c != &format!("DROP TABLE: {}", table));
            changes.push(format!("TABLE RENAME: {} (schema change)", table));
            renamed = Some(RenameInfo {
                from: table.clone(),
                to: table.clone(),
            });
        }
    }

    // Column loss vs rename, per table.
    for (table, tally) in &stats {
        let dropped = tally.dropped_columns.len();
        let added = tally.added_columns.len();
        if dropped == 0 {
            continue;
        }
        if dropped > added {
            changes.push(format!(
                "COLUMN LOSS: {} (net -{} columns)",
                table,
                dropped - added
            ));
        } else if added > 0 {
            changes.retain(|c| !c.starts_with(&format!("DROP COLUMN: {}.", table)));
            changes.push(format!(
                "COLUMN RENAME: {} ({} dropped, {} added)",
                table, dropped, added
            ));
        }
    }

    if changes.is_empty() {
        return None;
    }

    let mut entities: Vec<String> = Vec::new();
    for table in dropped_tables
        .iter()
        .chain(created_tables.iter())
        .chain(stats.keys())
    {
        if table != "unknown" && !entities.contains(table) {
            entities.push(table.clone());
        }
    }
    let tables_analyzed = dropped_tables
        .iter()
        .chain(created_tables.iter())
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    let score = score_changes(&changes, "database");
    let mut finding = DriftFinding::new(DriftType::Database, path);
    finding.severity = score.severity;
    finding.reasoning = score.reasoning;
    finding.changes = changes;
    finding.entities = entities;
    finding.metadata = Some(FindingMetadata {
        tables_analyzed: Some(tables_analyzed),
        renamed,
        ..Default::default()
    });
    Some(finding)
}
