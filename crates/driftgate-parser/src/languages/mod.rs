//! Language adapters and the shared AST outline machinery.
//!
//! Each adapter parses a file (where a grammar exists), collects function
//! spans and call edges from the tree, and detects framework idioms for API
//! handlers and database call sites, attributing each to its enclosing
//! function.

pub mod go;
pub mod java;
pub mod javascript;
pub mod python;

use tree_sitter::{Node, Tree};

use crate::types::{CallEdge, FileAnalysis};

/// A named function and its byte extent.
#[derive(Debug, Clone)]
pub struct FunctionSpan {
    pub symbol: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub line: u32,
}

#[derive(Debug, Default)]
pub struct AstOutline {
    pub functions: Vec<FunctionSpan>,
    pub calls: Vec<(String, usize, u32)>,
}

impl AstOutline {
    /// Innermost function containing `byte`, or `<module>`.
    pub fn enclosing_symbol(&self, byte: usize) -> String {
        self.functions
            .iter()
            .filter(|f| f.start_byte <= byte && byte < f.end_byte)
            .min_by_key(|f| f.end_byte - f.start_byte)
            .map(|f| f.symbol.clone())
            .unwrap_or_else(|| "<module>".to_string())
    }

    pub fn call_edges(&self) -> Vec<CallEdge> {
        self.calls
            .iter()
            .map(|(callee, byte, line)| CallEdge {
                caller: self.enclosing_symbol(*byte),
                callee: callee.clone(),
                line: *line,
            })
            .collect()
    }
}

pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}

pub fn line_of(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Line number for a raw byte offset, 1-based.
pub fn line_at(content: &str, byte: usize) -> u32 {
    content[..byte.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count() as u32
        + 1
}

/// Function name: the node's `name` field, else the nearest declarator or
/// assignment the function is bound to.
fn function_symbol(node: &Node, content: &str) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        return node_text(&name, content).to_string();
    }
    let mut current = *node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "variable_declarator" | "assignment_expression" | "assignment" | "pair"
            | "public_field_definition" => {
                if let Some(name) = parent
                    .child_by_field_name("name")
                    .or_else(|| parent.child_by_field_name("left"))
                    .or_else(|| parent.child_by_field_name("key"))
                {
                    return node_text(&name, content).to_string();
                }
            }
            _ => {}
        }
        if parent.kind().contains("function") || parent.kind() == "method_definition" {
            break;
        }
        current = parent;
    }
    "<anonymous>".to_string()
}

/// The called name for a call node: the trailing identifier of the callee
/// expression (`getUser`, `service.getUser` -> `getUser`).
fn callee_symbol(node: &Node, content: &str) -> Option<String> {
    let callee = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("name"))?;
    let text = node_text(&callee, content);
    let name = text
        .rsplit(|c| c == '.' || c == ':')
        .next()
        .unwrap_or(text)
        .trim();
    if name.is_empty() || !name.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
    {
        return None;
    }
    Some(name.to_string())
}

/// Walk the whole tree once, collecting function spans and call edges.
pub fn outline(
    tree: &Tree,
    content: &str,
    function_kinds: &[&str],
    call_kinds: &[&str],
) -> AstOutline {
    let mut out = AstOutline::default();
    collect(&tree.root_node(), content, function_kinds, call_kinds, &mut out);
    out
}

fn collect(
    node: &Node,
    content: &str,
    function_kinds: &[&str],
    call_kinds: &[&str],
    out: &mut AstOutline,
) {
    if function_kinds.contains(&node.kind()) {
        out.functions.push(FunctionSpan {
            symbol: function_symbol(node, content),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line: line_of(node),
        });
    }
    if call_kinds.contains(&node.kind()) {
        if let Some(callee) = callee_symbol(node, content) {
            out.calls.push((callee, node.start_byte(), line_of(node)));
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(&child, content, function_kinds, call_kinds, out);
    }
}

/// Adapter surface shared by all language modules.
pub trait LanguageAdapter {
    /// Parse and analyze one file; `None` when the content cannot be parsed.
    fn analyze(file_path: &str, content: &str) -> Option<FileAnalysis>;
}

/// Table name inferred from an ORM model identifier (`UserProfile` ->
/// `user_profiles`).
pub fn table_from_model(model: &str) -> String {
    driftgate_core::names::pluralize(&driftgate_core::names::to_snake_case(model))
}
