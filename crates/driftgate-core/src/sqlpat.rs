//! The SQL pattern set shared by the migration analyzer and raw-SQL string
//! analysis in the code analyzer.

use once_cell::sync::Lazy;
use regex::Regex;

// Identifiers may be bare, backtick/double-quote delimited, bracketed, or
// schema-qualified.
const IDENT: &str = r#"((?:[A-Za-z_][\w$]*|`[^`]+`|"[^"]+"|\[[^\]]+\])(?:\.(?:[A-Za-z_][\w$]*|`[^`]+`|"[^"]+"|\[[^\]]+\]))*)"#;

macro_rules! sql_re {
    ($name:ident, $pattern:expr) => {
        pub static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new(&$pattern.replace("{ident}", IDENT)).unwrap());
    };
}

sql_re!(DROP_TABLE, r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{ident}");
sql_re!(
    CREATE_TABLE,
    r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{ident}"
);
sql_re!(ALTER_TABLE, r"(?i)\bALTER\s+TABLE\s+(?:ONLY\s+)?{ident}");
sql_re!(TRUNCATE_TABLE, r"(?i)\bTRUNCATE\s+(?:TABLE\s+)?{ident}");
sql_re!(DROP_COLUMN, r"(?i)\bDROP\s+COLUMN\s+(?:IF\s+EXISTS\s+)?{ident}");
sql_re!(ADD_COLUMN, r"(?i)\bADD\s+(?:COLUMN\s+)?{ident}\s+[A-Za-z]");
sql_re!(DROP_CONSTRAINT, r"(?i)\bDROP\s+CONSTRAINT\s+(?:IF\s+EXISTS\s+)?{ident}");
sql_re!(ADD_CONSTRAINT, r"(?i)\bADD\s+CONSTRAINT\s+{ident}");
sql_re!(POLICY, r"(?i)\b(DROP|ALTER|CREATE)\s+POLICY\s+(?:IF\s+EXISTS\s+)?{ident}");
sql_re!(
    ALTER_COLUMN_TYPE,
    r"(?i)\bALTER\s+COLUMN\s+{ident}\s+(?:SET\s+DATA\s+)?TYPE\s+([A-Za-z]+\s*(?:\(\s*\d+(?:\s*,\s*\d+)?\s*\))?)"
);
sql_re!(SET_NOT_NULL, r"(?i)\bALTER\s+COLUMN\s+{ident}\s+SET\s+NOT\s+NULL");
sql_re!(
    ADD_NOT_NULL_COLUMN,
    r"(?i)\bADD\s+(?:COLUMN\s+)?{ident}\s+[A-Za-z][\w\s\(\),]*\bNOT\s+NULL"
);

// DML-only detection.
sql_re!(DML_INSERT, r"(?i)\bINSERT\s+INTO\b");
sql_re!(DML_UPDATE, r"(?i)\bUPDATE\s+{ident}\s+SET\b");
sql_re!(DML_DELETE, r"(?i)\bDELETE\s+FROM\b");
sql_re!(DDL_KEYWORD, r"(?i)\b(CREATE|ALTER|DROP|TRUNCATE)\b");

// Table references inside raw query strings.
sql_re!(REF_FROM, r"(?i)\bFROM\s+{ident}");
sql_re!(REF_JOIN, r"(?i)\bJOIN\s+{ident}");
sql_re!(REF_INSERT, r"(?i)\bINSERT\s+INTO\s+{ident}");
sql_re!(REF_UPDATE, r"(?i)\bUPDATE\s+{ident}\b");
sql_re!(REF_DELETE, r"(?i)\bDELETE\s+FROM\s+{ident}");

/// Strip quoting/brackets and any schema qualifier, lowercase the rest.
pub fn clean_identifier(raw: &str) -> String {
    let last = raw.rsplit('.').next().unwrap_or(raw);
    last.trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']')
        .to_lowercase()
}

/// A migration that only manipulates rows carries no schema drift.
pub fn is_dml_only(sql: &str) -> bool {
    let has_dml =
        DML_INSERT.is_match(sql) || DML_UPDATE.is_match(sql) || DML_DELETE.is_match(sql);
    has_dml && !DDL_KEYWORD.is_match(sql)
}

/// Recover table names referenced by a raw SQL string (used on string
/// literals found in source code).
pub fn extract_tables(sql: &str) -> Vec<String> {
    let mut tables = Vec::new();
    for re in [&*REF_FROM, &*REF_JOIN, &*REF_INSERT, &*REF_UPDATE, &*REF_DELETE] {
        for caps in re.captures_iter(sql) {
            let table = clean_identifier(&caps[1]);
            if !table.is_empty()
                && !is_sql_keyword(&table)
                && !tables.contains(&table)
            {
                tables.push(table);
            }
        }
    }
    tables
}

fn is_sql_keyword(word: &str) -> bool {
    matches!(
        word,
        "select" | "where" | "set" | "values" | "into" | "table" | "if" | "exists" | "dual"
    )
}

/// The kind of operation a raw query performs, for verb alignment.
pub fn query_operation(sql: &str) -> Option<&'static str> {
    let upper = sql.to_uppercase();
    let trimmed = upper.trim_start();
    if trimmed.starts_with("SELECT") {
        Some("SELECT")
    } else if trimmed.starts_with("INSERT") {
        Some("INSERT")
    } else if trimmed.starts_with("UPDATE") {
        Some("UPDATE")
    } else if trimmed.starts_with("DELETE") {
        Some("DELETE")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_table_captures_qualified_and_bracketed_names() {
        let caps = DROP_TABLE.captures("DROP TABLE IF EXISTS public.users;").unwrap();
        assert_eq!(clean_identifier(&caps[1]), "users");

        let caps = DROP_TABLE.captures("drop table [Order Details]").unwrap();
        assert_eq!(clean_identifier(&caps[1]), "order details");
    }

    #[test]
    fn dml_only_detection() {
        assert!(is_dml_only("INSERT INTO users (id) VALUES (1);"));
        assert!(is_dml_only("UPDATE users SET name = 'x'; DELETE FROM logs;"));
        assert!(!is_dml_only("INSERT INTO t VALUES (1); DROP TABLE t;"));
        assert!(!is_dml_only("CREATE TABLE t (id int);"));
    }

    #[test]
    fn raw_query_table_extraction() {
        let tables = extract_tables("SELECT * FROM users u JOIN orders o ON u.id = o.user_id");
        assert_eq!(tables, vec!["users".to_string(), "orders".to_string()]);

        let tables = extract_tables("DELETE FROM sessions WHERE expired = true");
        assert_eq!(tables, vec!["sessions".to_string()]);
    }

    #[test]
    fn query_operation_classification() {
        assert_eq!(query_operation("  select id from t"), Some("SELECT"));
        assert_eq!(query_operation("INSERT INTO t VALUES (1)"), Some("INSERT"));
        assert_eq!(query_operation("EXPLAIN SELECT 1"), None);
    }
}
