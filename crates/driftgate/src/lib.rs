//! DriftGate analyzes a proposed change set across four interacting layers
//! (API specifications, database migrations, infrastructure-as-code, and
//! application configuration), correlates findings across layers, and
//! produces a structured report that gates merges.

pub mod fetchers;
pub mod orchestrator;

pub use fetchers::MemoryFetcher;
pub use orchestrator::DriftGate;

pub use driftgate_core::{
    ChangeSet, ChangedFile, ContentFetcher, Correlation, DriftConfig, DriftFinding, DriftReport,
    DriftType, FetchedContent, FileStatus, ReportSummary, Severity, UserRule,
};
