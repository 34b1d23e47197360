//! SQLite-backed storage implementation (spec §4.2/C2 through §4.6/C8).
//!
//! Shape mirrors the teacher's `beads-storage::sqlite` module, minus a
//! `traits` module: `SqliteStore` is the only storage backend this system
//! has, so its C5-C10 operations are exposed directly as inherent methods
//! instead of going through a `Storage` trait indirection.

mod analytics;
mod comments;
mod config;
mod dependencies;
mod events;
mod files;
mod issues;
mod labels;
mod planning;
pub mod schema;
mod store;
mod summary;
mod txn;

pub use analytics::FlowMetrics;
pub use dependencies::{BlockedIssue, CriticalPath};
pub use files::{
    FileHotspot, FileListQuery, FileSummary, FileTimelineEntry, IncomingFinding, PaginatedFiles,
    RegisterFileParams, normalize_project_path,
};
pub use issues::{
    BatchItemError, BatchOutcome, ClaimNextOutcome, CreateIssueParams, IssueQuery, UndoOutcome,
    UpdateIssueParams,
};
pub use store::SqliteStore;
