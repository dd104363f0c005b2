//! JavaScript / TypeScript adapter: express-style router registrations,
//! prisma/knex/sequelize/typeorm call sites, raw SQL strings, ES and
//! CommonJS imports.

use once_cell::sync::Lazy;
use regex::Regex;

use driftgate_core::sqlpat;

use crate::language::{LanguageRegistry, SourceLanguage};
use crate::types::{DbRef, FileAnalysis, Handler, Import};

use super::{line_at, outline, LanguageAdapter};

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "arrow_function",
    "method_definition",
    "generator_function_declaration",
];
const CALL_KINDS: &[&str] = &["call_expression", "new_expression"];

static ROUTE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:router|app|api|server|fastify)\.(get|post|put|delete|patch|all)\s*\(\s*['"`]([^'"`]+)['"`]\s*(?:,\s*([A-Za-z_$][\w$]*))?"#,
    )
    .unwrap()
});
static PRISMA_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bprisma\.([A-Za-z_$][\w$]*)\.(findUnique|findUniqueOrThrow|findFirst|findMany|create|createMany|update|updateMany|upsert|delete|deleteMany|count|aggregate)\s*\(",
    )
    .unwrap()
});
static KNEX_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bknex\s*\(\s*['"]([\w.]+)['"]"#).unwrap());
static REPOSITORY_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bgetRepository\s*\(\s*([A-Za-z_]\w*)\s*\)").unwrap());
static SEQUELIZE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]\w*)\.(findAll|findOne|findByPk|create|update|destroy|bulkCreate)\s*\(")
        .unwrap()
});
static RAW_QUERY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.(?:query|execute)\s*\(\s*(?:`([^`]+)`|'([^']+)'|"([^"]+)")"#).unwrap()
});
static ES_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:\{\s*([^}]+)\s*\}|([A-Za-z_$][\w$]*))\s+from\s+['"]([^'"]+)['"]"#)
        .unwrap()
});
static REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:const|let|var)\s+(?:\{\s*([^}]+)\s*\}|([A-Za-z_$][\w$]*))\s*=\s*require\s*\(\s*['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

fn prisma_op(op: &str) -> &'static str {
    match op {
        o if o.starts_with("find") || o == "count" || o == "aggregate" => "SELECT",
        "create" | "createMany" => "INSERT",
        "update" | "updateMany" | "upsert" => "UPDATE",
        _ => "DELETE",
    }
}

fn sequelize_op(op: &str) -> &'static str {
    match op {
        "findAll" | "findOne" | "findByPk" => "SELECT",
        "create" | "bulkCreate" => "INSERT",
        "update" => "UPDATE",
        _ => "DELETE",
    }
}

fn push_imports(out: &mut Vec<Import>, names: Option<&str>, single: Option<&str>, source: &str) {
    if let Some(names) = names {
        for name in names.split(',') {
            let local = name
                .rsplit(" as ")
                .next()
                .unwrap_or(name)
                .trim()
                .to_string();
            if !local.is_empty() {
                out.push(Import {
                    local,
                    source: source.to_string(),
                });
            }
        }
    }
    if let Some(single) = single {
        out.push(Import {
            local: single.trim().to_string(),
            source: source.to_string(),
        });
    }
}

pub struct JavaScriptAdapter;

impl JavaScriptAdapter {
    pub fn analyze_as(
        language: SourceLanguage,
        file_path: &str,
        content: &str,
    ) -> Option<FileAnalysis> {
        let registry = LanguageRegistry::new();
        let mut parser = registry.create_parser(language)?;
        let tree = parser.parse(content, None)?;
        let outline = outline(&tree, content, FUNCTION_KINDS, CALL_KINDS);

        let mut analysis = FileAnalysis::default();

        for caps in ROUTE_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let symbol = caps
                .get(3)
                .map(|m| m.as_str())
                .filter(|s| *s != "async" && *s != "function")
                .map(String::from)
                .unwrap_or_else(|| outline.enclosing_symbol(byte));
            analysis.handlers.push(Handler {
                method: caps[1].to_uppercase(),
                path: caps[2].to_string(),
                file: file_path.to_string(),
                symbol,
                line: line_at(content, byte),
            });
        }

        for caps in PRISMA_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "prisma".into(),
                table: caps[1].to_lowercase(),
                op: Some(prisma_op(&caps[2]).to_string()),
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: true,
            });
        }
        for caps in KNEX_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "knex".into(),
                table: caps[1].to_lowercase(),
                op: None,
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: false,
            });
        }
        for caps in REPOSITORY_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            analysis.db_refs.push(DbRef {
                orm: "typeorm".into(),
                table: super::table_from_model(&caps[1]),
                op: None,
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: true,
            });
        }
        for caps in SEQUELIZE_CALL.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            // Prisma accesses spell the client lowercase; an uppercase
            // receiver here is a model class.
            analysis.db_refs.push(DbRef {
                orm: "sequelize".into(),
                table: super::table_from_model(&caps[1]),
                op: Some(sequelize_op(&caps[2]).to_string()),
                file: file_path.to_string(),
                symbol: outline.enclosing_symbol(byte),
                line: line_at(content, byte),
                inferred: true,
            });
        }
        for caps in RAW_QUERY.captures_iter(content) {
            let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let sql = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
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

        for caps in ES_IMPORT.captures_iter(content) {
            push_imports(
                &mut analysis.imports,
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
                &caps[3],
            );
        }
        for caps in REQUIRE.captures_iter(content) {
            push_imports(
                &mut analysis.imports,
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
                &caps[3],
            );
        }

        analysis.calls = outline.call_edges();
        Some(analysis)
    }
}

impl LanguageAdapter for JavaScriptAdapter {
    fn analyze(file_path: &str, content: &str) -> Option<FileAnalysis> {
        JavaScriptAdapter::analyze_as(SourceLanguage::JavaScript, file_path, content)
    }
}
