//! Java/Kotlin adapter: Spring controller annotations, JPA table mappings,
//! and `@Query` raw SQL. Java files are parsed with tree-sitter; Kotlin has
//! no compatible grammar crate, so the same patterns run over raw lines with
//! `fun` declarations as function anchors.

use once_cell::sync::Lazy;
use regex::Regex;

use driftgate_core::sqlpat;

use crate::language::{LanguageRegistry, SourceLanguage};
use crate::types::{DbRef, FileAnalysis, Handler, Import};

use super::{line_at, outline, AstOutline, FunctionSpan, LanguageAdapter};

const FUNCTION_KINDS: &[&str] = &["method_declaration", "constructor_declaration"];
const CALL_KINDS: &[&str] = &["method_invocation", "object_creation_expression"];

static MAPPING_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@(Get|Post|Put|Delete|Patch)Mapping\s*\(\s*(?:value\s*=\s*)?"([^"]+)""#)
        .unwrap()
});
static REQUEST_MAPPING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@RequestMapping\s*\(\s*(?:value\s*=\s*)?"([^"]+)"(?:[^)]*method\s*=\s*RequestMethod\.(\w+))?"#,
    )
    .unwrap()
});
static NEXT_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:public|protected|private|suspend|fun)\s+[\w<>\[\],\s]*?(\w+)\s*\(").unwrap()
});
static TABLE_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@Table\s*\(\s*name\s*=\s*"([\w.]+)""#).unwrap());
static QUERY_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@Query\s*\(\s*"((?:[^"\\]|\\.)+)""#).unwrap());
static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+?)(?:\.\*)?\s*;?\s*$").unwrap());
static KOTLIN_FUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfun\s+(\w+)\s*\(").unwrap());

fn handler_symbol(content: &str, after: usize) -> String {
    NEXT_METHOD
        .captures(&content[after..])
        .map(|m| m[1].to_string())
        .unwrap_or_else(|| "<module>".to_string())
}

/// Kotlin fallback outline: `fun` declarations as flat spans running to the
/// next declaration.
fn kotlin_outline(content: &str) -> AstOutline {
    let mut outline = AstOutline::default();
    let matches: Vec<(usize, String)> = KOTLIN_FUN
        .captures_iter(content)
        .filter_map(|caps| caps.get(0).map(|m| (m.start(), caps[1].to_string())))
        .collect();
    for (i, (start, symbol)) in matches.iter().enumerate() {
        let end = matches
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(content.len());
        outline.functions.push(FunctionSpan {
            symbol: symbol.clone(),
            start_byte: *start,
            end_byte: end,
            line: line_at(content, *start),
        });
    }
    outline
}

fn scan(file_path: &str, content: &str, outline: &AstOutline) -> FileAnalysis {
    let mut analysis = FileAnalysis::default();

    for caps in MAPPING_ANNOTATION.captures_iter(content) {
        let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        analysis.handlers.push(Handler {
            method: caps[1].to_uppercase(),
            path: caps[2].to_string(),
            file: file_path.to_string(),
            symbol: handler_symbol(content, end),
            line: line_at(content, byte),
        });
    }
    for caps in REQUEST_MAPPING.captures_iter(content) {
        let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        analysis.handlers.push(Handler {
            method: caps
                .get(2)
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| "GET".to_string()),
            path: caps[1].to_string(),
            file: file_path.to_string(),
            symbol: handler_symbol(content, end),
            line: line_at(content, byte),
        });
    }

    for caps in TABLE_ANNOTATION.captures_iter(content) {
        let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
        analysis.db_refs.push(DbRef {
            orm: "jpa".into(),
            table: caps[1].to_lowercase(),
            op: None,
            file: file_path.to_string(),
            symbol: outline.enclosing_symbol(byte),
            line: line_at(content, byte),
            inferred: false,
        });
    }
    for caps in QUERY_ANNOTATION.captures_iter(content) {
        let byte = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let sql = &caps[1];
        let op = sqlpat::query_operation(sql);
        for table in sqlpat::extract_tables(sql) {
            analysis.db_refs.push(DbRef {
                orm: "jpa".into(),
                table,
                op: op.map(String::from),
                // A repository @Query annotates the method that follows it.
                symbol: handler_symbol(content, end),
                file: file_path.to_string(),
                line: line_at(content, byte),
                inferred: false,
            });
        }
    }

    for caps in IMPORT_LINE.captures_iter(content) {
        let source = caps[1].to_string();
        let local = source.rsplit('.').next().unwrap_or(&source).to_string();
        analysis.imports.push(Import { local, source });
    }

    analysis.calls = outline.call_edges();
    analysis
}

pub struct JavaAdapter;

impl JavaAdapter {
    pub fn analyze_kotlin(file_path: &str, content: &str) -> Option<FileAnalysis> {
        let outline = kotlin_outline(content);
        Some(scan(file_path, content, &outline))
    }
}

impl LanguageAdapter for JavaAdapter {
    fn analyze(file_path: &str, content: &str) -> Option<FileAnalysis> {
        let registry = LanguageRegistry::new();
        let mut parser = registry.create_parser(SourceLanguage::Java)?;
        let tree = parser.parse(content, None)?;
        let outline = outline(&tree, content, FUNCTION_KINDS, CALL_KINDS);
        Some(scan(file_path, content, &outline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = r#"
package com.example.api;

import com.example.service.UserService;

@RestController
public class UserController {
    @GetMapping("/v1/users/{id}")
    public User getUser(@PathVariable Long id) {
        return userService.findUser(id);
    }

    @DeleteMapping(value = "/v1/users/{id}")
    public void removeUser(@PathVariable Long id) {
        userService.deleteUser(id);
    }
}
"#;

    #[test]
    fn mapping_annotations_become_handlers() {
        let analysis = JavaAdapter::analyze("src/UserController.java", CONTROLLER).unwrap();
        assert_eq!(analysis.handlers.len(), 2);
        assert_eq!(analysis.handlers[0].method, "GET");
        assert_eq!(analysis.handlers[0].symbol, "getUser");
        assert_eq!(analysis.handlers[0].endpoint(), "GET:/v1/users/{id}");
        assert_eq!(analysis.handlers[1].method, "DELETE");
        assert_eq!(analysis.handlers[1].symbol, "removeUser");
    }

    #[test]
    fn call_edges_flow_from_handler_methods() {
        let analysis = JavaAdapter::analyze("src/UserController.java", CONTROLLER).unwrap();
        assert!(analysis
            .calls
            .iter()
            .any(|c| c.caller == "getUser" && c.callee == "findUser"));
    }

    #[test]
    fn query_annotation_recovers_tables() {
        let repo = r#"
public interface OrderRepository {
    @Query("SELECT o FROM orders o WHERE o.status = ?1")
    List<Order> findByStatus(String status);
}
"#;
        let analysis = JavaAdapter::analyze("src/OrderRepository.java", repo).unwrap();
        assert_eq!(analysis.db_refs.len(), 1);
        assert_eq!(analysis.db_refs[0].table, "orders");
        assert_eq!(analysis.db_refs[0].symbol, "findByStatus");
    }

    #[test]
    fn kotlin_path_uses_fun_anchors() {
        let source = r#"
import com.example.service.OrderService

@RestController
class OrderController {
    @GetMapping("/v1/orders/{id}")
    fun getOrder(@PathVariable id: Long): Order {
        return orderService.find(id)
    }
}
"#;
        let analysis = JavaAdapter::analyze_kotlin("src/OrderController.kt", source).unwrap();
        assert_eq!(analysis.handlers.len(), 1);
        assert_eq!(analysis.handlers[0].symbol, "getOrder");
        assert_eq!(analysis.handlers[0].endpoint(), "GET:/v1/orders/{id}");
    }
}
