//! Python adapter: flask/fastapi route decorators, sqlalchemy/django ORM
//! idioms, raw cursor SQL, and import bindings.

use once_cell::sync::Lazy;
use regex::Regex;

use driftgate_core::sqlpat;

use crate::language::{LanguageRegistry, SourceLanguage};
use crate::types::{DbRef, FileAnalysis, Handler, Import};

use super::{line_at, outline, LanguageAdapter};

const FUNCTION_KINDS: &[&str] = &["function_definition"];
const CALL_KINDS: &[&str] = &["call"];

static ROUTE_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@(?:app|router|api|blueprint|bp)\.(get|post|put|delete|patch|route)\s*\(\s*['"]([^'"]+)['"]([^)]*)\)"#,
    )
    .unwrap()
});
static METHODS_KWARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"methods\s*=\s*\[\s*['"](\w+)['"]"#).unwrap());
static NEXT_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"def\s+(\w+)\s*\(").unwrap());
static SESSION_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:session|db\.session|db)\.query\s*\(\s*([A-Z]\w*)").unwrap());
static DJANGO_OBJECTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]\w*)\.objects\.(\w+)\s*\(").unwrap());
static RAW_EXECUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.execute\s*\(\s*(?:"""([\s\S]+?)"""|'''([\s\S]+?)'''|"([^"]+)"|'([^']+)')"#)
        .unwrap()
});
static IMPORT_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\s+(.+)$").unwrap());
static IMPORT_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)(?:\s+as\s+(\w+))?").unwrap());

fn django_op(method: &str) -> Option<&'static str> {
    match method {
        "get" | "filter" | "all" | "first" | "count" | "exists" => Some("SELECT"),
        "create" | "bulk_create" | "get_or_create" => Some("INSERT"),
        "update" => Some("UPDATE"),
        "delete" => Some("DELETE"),
        _ => None,
    }
}

pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn analyze(file_path: &str, content: &str) -> Option<FileAnalysis> {
        let registry = LanguageRegistry::new();
        let mut parser = registry.create_parser(SourceLanguage::Python)?;
        let tree = parser.parse(content, None)?;
        let outline = outline(&tree, content, FUNCTION_KINDS, CALL_KINDS);

        let mut analysis = FileAnalysis::default();

        for caps in ROUTE_DECORATOR.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let verb = caps[1].to_string();
            let method = if verb == "route" {
                METHODS_KWARG
                    .captures(&caps[3])
                    .map(|m| m[1].to_uppercase())
                    .unwrap_or_else(|| "GET".to_string())
            } else {
                verb.to_uppercase()
            };
            // The decorated function follows the decorator.
            let symbol = NEXT_DEF
                .captures(&content[end..])
                .map(|m| m[1].to_string())
                .unwrap_or_else(|| "<module>".to_string());
            analysis.handlers.push(Handler {
                method,
                path: caps[2].to_string(),
                file: file_path.to_string(),
                symbol,
                line: line_at(content, byte),
            });
        }

        for caps in SESSION_QUERY.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "sqlalchemy".into(),
                table: super::table_from_model(&caps[1]),
                op: Some("SELECT".into()),
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: true,
            });
        }
        for caps in DJANGO_OBJECTS.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "django".into(),
                table: super::table_from_model(&caps[1]),
                op: django_op(&caps[2]).map(String::from),
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: true,
            });
        }
        for caps in RAW_EXECUTE.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let sql = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let op = sqlpat::query_operation(sql);
            for table in sqlpat::extract_tables(sql) {
                analysis.db_refs.push(DbRef {
                    orm: "sql".into(),
                    table,
                    op: op.map(String::from),
                    file: file_path.to_string(),
                    symbol: outline.enclosing_symbol(byte),
                    line: line_at(content, byte),
                    inferred: false,
                });
            }
        }

        for caps in IMPORT_FROM.captures_iter(content) {
            let source = caps[1].to_string();
            for name in caps[2].split(',') {
                let local = name
                    .rsplit(" as ")
                    .next()
                    .unwrap_or(name)
                    .trim()
                    .trim_matches('(')
                    .trim_matches(')')
                    .to_string();
                if !local.is_empty() {
                    analysis.imports.push(Import {
                        local,
                        source: source.clone(),
                    });
                }
            }
        }
        for caps in IMPORT_PLAIN.captures_iter(content) {
            let source = caps[1].to_string();
            let local = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| source.rsplit('.').next().unwrap_or(&source).to_string());
            analysis.imports.push(Import { local, source });
        }

        analysis.calls = outline.call_edges();
        Some(analysis)
    }
}
