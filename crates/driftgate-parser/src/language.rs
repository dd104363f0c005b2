//! Maps file extensions to Tree-sitter grammars and builds configured
//! parsers for the languages the code analyzer understands.

use std::collections::HashMap;

use tree_sitter::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Python,
    Go,
    Java,
    /// No compatible grammar crate; handled by the java/kotlin adapter's
    /// line-pattern path.
    Kotlin,
}

pub struct LanguageConfig {
    pub grammar: Option<tree_sitter::Language>,
    pub file_extensions: Vec<&'static str>,
}

pub struct LanguageRegistry {
    configs: HashMap<SourceLanguage, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut configs = HashMap::new();

        configs.insert(
            SourceLanguage::JavaScript,
            LanguageConfig {
                grammar: Some(tree_sitter_javascript::LANGUAGE.into()),
                file_extensions: vec!["js", "jsx", "mjs", "cjs"],
            },
        );

        configs.insert(
            SourceLanguage::TypeScript,
            LanguageConfig {
                grammar: Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
                file_extensions: vec!["ts", "tsx"],
            },
        );

        configs.insert(
            SourceLanguage::Python,
            LanguageConfig {
                grammar: Some(tree_sitter_python::LANGUAGE.into()),
                file_extensions: vec!["py"],
            },
        );

        configs.insert(
            SourceLanguage::Go,
            LanguageConfig {
                grammar: Some(tree_sitter_go::LANGUAGE.into()),
                file_extensions: vec!["go"],
            },
        );

        configs.insert(
            SourceLanguage::Java,
            LanguageConfig {
                grammar: Some(tree_sitter_java::LANGUAGE.into()),
                file_extensions: vec!["java"],
            },
        );

        configs.insert(
            SourceLanguage::Kotlin,
            LanguageConfig {
                grammar: None,
                file_extensions: vec!["kt", "kts"],
            },
        );

        Self { configs }
    }

    pub fn detect_language(&self, file_path: &str) -> Option<SourceLanguage> {
        let extension = std::path::Path::new(file_path).extension()?.to_str()?;
        for (lang, config) in &self.configs {
            if config.file_extensions.contains(&extension) {
                return Some(*lang);
            }
        }
        None
    }

    pub fn create_parser(&self, language: SourceLanguage) -> Option<Parser> {
        let grammar = self.configs.get(&language)?.grammar.as_ref()?;
        let mut parser = Parser::new();
        parser.set_language(grammar).ok()?;
        Some(parser)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_by_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.detect_language("src/routes/users.js"),
            Some(SourceLanguage::JavaScript)
        );
        assert_eq!(
            registry.detect_language("api/handlers.go"),
            Some(SourceLanguage::Go)
        );
        assert_eq!(
            registry.detect_language("App.kt"),
            Some(SourceLanguage::Kotlin)
        );
        assert_eq!(registry.detect_language("README.md"), None);
    }

    #[test]
    fn parsers_build_for_grammar_backed_languages() {
        let registry = LanguageRegistry::new();
        assert!(registry.create_parser(SourceLanguage::JavaScript).is_some());
        assert!(registry.create_parser(SourceLanguage::Java).is_some());
        assert!(registry.create_parser(SourceLanguage::Kotlin).is_none());
    }
}
