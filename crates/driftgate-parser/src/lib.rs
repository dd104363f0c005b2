pub mod analyzer;
pub mod index;
pub mod language;
pub mod languages;
pub mod types;

pub use analyzer::{analyze_source, CodeAnalyzer};
pub use index::CodeIndex;
pub use language::{LanguageRegistry, SourceLanguage};
pub use types::{CallEdge, DbRef, FileAnalysis, Handler, Import};
