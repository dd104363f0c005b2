//! Go adapter: net/http and gin/echo/chi handler registration, database/sql
//! query sites, gorm table refs, and import bindings.

use once_cell::sync::Lazy;
use regex::Regex;

use driftgate_core::sqlpat;

use crate::language::{LanguageRegistry, SourceLanguage};
use crate::types::{DbRef, FileAnalysis, Handler, Import};

use super::{line_at, outline, LanguageAdapter};

const FUNCTION_KINDS: &[&str] = &["function_declaration", "method_declaration", "func_literal"];
const CALL_KINDS: &[&str] = &["call_expression"];

static ROUTE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b\w+\.(GET|POST|PUT|DELETE|PATCH|Get|Post|Put|Delete|Patch|HandleFunc)\s*\(\s*"([^"]+)"\s*,\s*([\w.]+)"#,
    )
    .unwrap()
});
static RAW_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "\\.(?:Query|QueryRow|Exec|QueryContext|QueryRowContext|ExecContext)\\s*\\(\\s*(?:\\w+\\s*,\\s*)?(?:`([^`]+)`|\"([^\"]+)\")",
    )
    .unwrap()
});
static GORM_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\.Table\s*\(\s*"([\w.]+)"\s*\)"#).unwrap());
static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*(?:(\w+)\s+)?"([\w./-]+)"\s*$"#).unwrap());

pub struct GoAdapter;

impl LanguageAdapter for GoAdapter {
    fn analyze(file_path: &str, content: &str) -> Option<FileAnalysis> {
        let registry = LanguageRegistry::new();
        let mut parser = registry.create_parser(SourceLanguage::Go)?;
        let tree = parser.parse(content, None)?;
        let outline = outline(&tree, content, FUNCTION_KINDS, CALL_KINDS);

        let mut analysis = FileAnalysis::default();

        for caps in ROUTE_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let verb = caps[1].to_string();
            let method = if verb == "HandleFunc" {
                "GET".to_string()
            } else {
                verb.to_uppercase()
            };
            let symbol = caps[3]
                .rsplit('.')
                .next()
                .unwrap_or(&caps[3])
                .to_string();
            analysis.handlers.push(Handler {
                method,
                path: caps[2].to_string(),
                file: file_path.to_string(),
                symbol,
                line: line_at(content, byte),
            });
        }

        for caps in RAW_QUERY.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let sql = caps
                .get(1)
                .or_else(|| caps.get(2))
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
        for caps in GORM_TABLE.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "gorm".into(),
                table: caps[1].to_lowercase(),
                op: None,
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: false,
            });
        }

        // Import block entries: `alias "path"` or bare `"path"`.
        for caps in IMPORT_LINE.captures_iter(content) {
            let source = caps[2].to_string();
            let local = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| source.rsplit('/').next().unwrap_or(&source).to_string());
            analysis.imports.push(Import { local, source });
        }

        analysis.calls = outline.call_edges();
        Some(analysis)
    }
}
