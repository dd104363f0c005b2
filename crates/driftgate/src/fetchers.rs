//! In-memory `ContentFetcher` for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;

use driftgate_core::{ContentFetcher, FetchedContent, Result};

/// Serves file contents from a `(revision, path)` map, base64-encoded the
/// way a hosting platform's content API would.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    files: HashMap<(String, String), String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        rev: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> &mut Self {
        self.files.insert((rev.into(), path.into()), content.into());
        self
    }

    pub fn with(
        mut self,
        rev: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.insert(rev, path, content);
        self
    }
}

#[async_trait]
impl ContentFetcher for MemoryFetcher {
    async fn fetch(&self, path: &str, rev: &str) -> Result<Option<FetchedContent>> {
        Ok(self
            .files
            .get(&(rev.to_string(), path.to_string()))
            .map(|text| FetchedContent::from_plain(text)))
    }
}
