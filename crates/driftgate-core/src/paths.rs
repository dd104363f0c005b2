use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::error::{DriftError, Result};

/// Canonical posix form used everywhere a path becomes part of an identity:
/// backslashes become `/`, runs of `/` collapse, trailing `/` and leading
/// `./` are stripped. Idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    while out.ends_with('/') {
        out.pop();
    }
    while let Some(rest) = out.strip_prefix("./") {
        out = rest.to_string();
    }
    out
}

/// Build a matcher with the documented glob semantics: `**/` crosses any
/// number of path segments, `*` stays within a single segment.
pub fn glob_matcher(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| DriftError::Configuration(format!("invalid glob '{}': {}", pattern, e)))?;
    Ok(glob.compile_matcher())
}

/// `true` when `pattern` looks like a glob rather than a literal token.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Match a normalized path against a glob pattern. A pattern that fails to
/// compile matches nothing.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    match glob_matcher(pattern) {
        Ok(m) => m.is_match(normalize_path(path)),
        Err(_) => false,
    }
}

/// Validate a glob pattern eagerly so configuration errors surface once.
pub fn validate_glob(pattern: &str) -> Result<()> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| DriftError::Configuration(format!("invalid glob '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "./src//routes\\users.js",
            "a/b/c/",
            ".//x",
            "plain.txt",
            "deep///nested//dir/",
        ] {
            let once = normalize_path(raw);
            assert_eq!(normalize_path(&once), once, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn normalization_produces_posix_paths() {
        assert_eq!(normalize_path("src\\db\\migrate.sql"), "src/db/migrate.sql");
        assert_eq!(normalize_path("./config//app.yaml"), "config/app.yaml");
        assert_eq!(normalize_path("dir/"), "dir");
    }

    #[test]
    fn double_star_crosses_segments_single_star_does_not() {
        assert!(glob_match("**/*.sql", "db/migrations/001.sql"));
        assert!(glob_match("**/*.sql", "001.sql"));
        assert!(glob_match("db/*.sql", "db/001.sql"));
        assert!(!glob_match("db/*.sql", "db/migrations/001.sql"));
    }

    #[test]
    fn backslash_paths_match_posix_globs() {
        assert!(glob_match("**/*.sql", "db\\migrations\\001.sql"));
    }
}
