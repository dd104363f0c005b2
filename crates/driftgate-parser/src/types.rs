use serde::{Deserialize, Serialize};

/// An API handler registration found in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub method: String,
    pub path: String,
    pub file: String,
    pub symbol: String,
    pub line: u32,
}

impl Handler {
    /// Endpoint token in the canonical `METHOD:path` shape, route parameters
    /// normalized to `{param}` placeholders.
    pub fn endpoint(&self) -> String {
        format!(
            "{}:{}",
            self.method.to_uppercase(),
            normalize_route(&self.path)
        )
    }
}

/// Normalize framework route syntax (`:id`, `<id>`, `{id}`) to `{param}`
/// placeholders so endpoints compare across languages and specs.
pub fn normalize_route(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if segment.starts_with('<') && segment.ends_with('>') {
                let inner = &segment[1..segment.len() - 1];
                let name = inner.rsplit(':').next().unwrap_or(inner);
                format!("{{{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A database call site found in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbRef {
    pub orm: String,
    pub table: String,
    pub op: Option<String>,
    pub file: String,
    pub symbol: String,
    pub line: u32,
    /// `true` when the table name was inferred from an ORM model name
    /// rather than read from a literal.
    pub inferred: bool,
}

/// A call edge; `caller` is a local symbol, `callee` a (possibly imported)
/// symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    pub line: u32,
}

/// An import binding a local name to another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub local: String,
    pub source: String,
}

/// Everything extracted from one file; cache value of the content-hash
/// cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub hash: String,
    pub handlers: Vec<Handler>,
    pub db_refs: Vec<DbRef>,
    pub calls: Vec<CallEdge>,
    pub imports: Vec<Import>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_normalization_covers_framework_syntaxes() {
        assert_eq!(normalize_route("/v1/users/:id"), "/v1/users/{id}");
        assert_eq!(normalize_route("/users/<int:user_id>"), "/users/{user_id}");
        assert_eq!(normalize_route("/users/{id}"), "/users/{id}");
        assert_eq!(normalize_route("/health"), "/health");
    }

    #[test]
    fn endpoint_token_uppercases_method() {
        let handler = Handler {
            method: "get".into(),
            path: "/v1/users/:id".into(),
            file: "src/routes/users.js".into(),
            symbol: "getUserById".into(),
            line: 12,
        };
        assert_eq!(handler.endpoint(), "GET:/v1/users/{id}");
    }
}
