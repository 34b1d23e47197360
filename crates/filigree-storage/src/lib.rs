//! The SQLite storage engine: schema/migrations (C2), event log (C4), and
//! the issue (C5), dependency (C6), planning (C7), and file/findings (C8)
//! engines, all exposed as `impl SqliteStore` methods rather than a
//! separate "engine" layer — grounded in the teacher's
//! `beads-storage::sqlite::issues` pattern of putting business logic
//! directly on the storage type.

pub mod error;
pub mod sqlite;

pub use error::StorageError;
pub use sqlite::schema::CURRENT_SCHEMA_VERSION;
pub use sqlite::{
    BatchItemError, BatchOutcome, BlockedIssue, ClaimNextOutcome, CreateIssueParams, CriticalPath,
    FileHotspot, FileListQuery, FileSummary, FileTimelineEntry, FlowMetrics, IncomingFinding,
    IssueQuery, PaginatedFiles, RegisterFileParams, SqliteStore, UndoOutcome, UpdateIssueParams,
    normalize_project_path,
};
