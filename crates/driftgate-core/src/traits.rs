use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DriftConfig;
use crate::error::{DriftError, Result};
use crate::types::{ChangeSet, DriftFinding};

/// Content as served by a hosting platform's content API: a base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub content: String,
}

impl FetchedContent {
    pub fn from_plain(text: &str) -> Self {
        Self {
            content: general_purpose::STANDARD.encode(text.as_bytes()),
        }
    }

    pub fn decode(&self) -> Result<String> {
        // Content APIs wrap base64 at column boundaries.
        let compact: String = self.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| DriftError::Decode(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| DriftError::Decode(e.to_string()))
    }
}

/// Reads a file at a revision. `Ok(None)` means the file does not exist at
/// that revision: a domain signal, not an error.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, path: &str, rev: &str) -> Result<Option<FetchedContent>>;
}

/// Everything an analyzer needs for one run. Fetches flow through
/// [`AnalyzeContext::fetch_text`], which is the pipeline's only suspension
/// point and enforces the fan-out bound, cancellation, and the per-fetch
/// deadline.
pub struct AnalyzeContext<'a> {
    pub change_set: &'a ChangeSet,
    pub fetcher: &'a dyn ContentFetcher,
    pub config: &'a DriftConfig,
    pub cancel: CancellationToken,
    fetch_permits: Arc<Semaphore>,
}

impl<'a> AnalyzeContext<'a> {
    pub fn new(
        change_set: &'a ChangeSet,
        fetcher: &'a dyn ContentFetcher,
        config: &'a DriftConfig,
        cancel: CancellationToken,
    ) -> Self {
        let fan_out = config.fetch_fan_out.max(1);
        Self {
            change_set,
            fetcher,
            config,
            cancel,
            fetch_permits: Arc::new(Semaphore::new(fan_out)),
        }
    }

    /// Fetch and decode a file at a revision. Cancellation and deadline
    /// expiry both resolve to "content absent" so analyzers can treat them
    /// as a domain signal.
    pub async fn fetch_text(&self, path: &str, rev: &str) -> Result<Option<String>> {
        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|_| DriftError::Fetch("fetch pool closed".into()))?;

        if self.cancel.is_cancelled() {
            info!(path, rev, "fetch canceled; treating content as absent");
            return Ok(None);
        }

        let deadline = Duration::from_secs(self.config.fetch_timeout_secs.max(1));
        let fetch = self.fetcher.fetch(path, rev);
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => {
                info!(path, rev, "fetch canceled; treating content as absent");
                return Ok(None);
            }
            outcome = tokio::time::timeout(deadline, fetch) => match outcome {
                Err(_) => {
                    warn!(path, rev, timeout_secs = deadline.as_secs(), "fetch deadline expired");
                    return Ok(None);
                }
                Ok(result) => result?,
            },
        };

        match fetched {
            None => Ok(None),
            Some(content) => match content.decode() {
                Ok(text) => Ok(Some(text)),
                Err(e) => {
                    warn!(path, rev, error = %e, "failed to decode fetched content");
                    Ok(None)
                }
            },
        }
    }

    /// Fetch a file at base and head in one call.
    pub async fn fetch_both(&self, path: &str) -> Result<(Option<String>, Option<String>)> {
        let base = self
            .fetch_text(path, &self.change_set.base_ref)
            .await?;
        let head = self
            .fetch_text(path, &self.change_set.head_ref)
            .await?;
        Ok((base, head))
    }
}

/// Capability set of a layer analyzer. The orchestrator is oblivious to the
/// concrete type behind it.
#[async_trait]
pub trait DriftAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this analyzer has anything to say about `path` under the
    /// given configuration.
    fn can_handle(&self, path: &str, config: &DriftConfig) -> bool;

    async fn analyze(&self, ctx: &AnalyzeContext<'_>) -> Result<Vec<DriftFinding>>;
}
