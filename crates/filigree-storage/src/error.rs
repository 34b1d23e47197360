//! Storage-layer error type.
//!
//! Mirrors the teacher's `beads-storage::error::StorageError`: a thiserror
//! enum wrapping the driver error plus a handful of storage-specific
//! variants, with `From` conversions both in (`rusqlite::Error`,
//! `serde_json::Error`) and out (to [`filigree_core::error::FiligreeError`]).

use filigree_core::error::FiligreeError;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(
        "invalid transition from {from:?} to {to:?} (valid: {valid_transitions:?}, missing fields: {missing_fields:?})"
    )]
    InvalidTransition {
        from: String,
        to: String,
        valid_transitions: Vec<String>,
        missing_fields: Vec<String>,
    },

    #[error("issue already claimed by {current_assignee:?}")]
    AlreadyClaimed { current_assignee: String },

    #[error("adding dependency {issue_id} -> {depends_on_id} would create a cycle")]
    CycleDetected {
        issue_id: String,
        depends_on_id: String,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<StorageError> for FiligreeError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { kind, id } => FiligreeError::NotFound { kind, id },
            StorageError::Validation(msg) => FiligreeError::Validation(msg),
            StorageError::InvalidTransition {
                from,
                to,
                valid_transitions,
                missing_fields,
            } => FiligreeError::InvalidTransition {
                from,
                to,
                valid_transitions,
                missing_fields,
            },
            StorageError::AlreadyClaimed { current_assignee } => {
                FiligreeError::AlreadyClaimed { current_assignee }
            }
            StorageError::CycleDetected {
                issue_id,
                depends_on_id,
            } => FiligreeError::WouldCreateCycle {
                issue_id,
                depends_on_id,
            },
            StorageError::InvalidPath(p) => FiligreeError::InvalidPath(p),
            StorageError::Conflict(msg) => FiligreeError::Conflict(msg),
            StorageError::Query(e) => FiligreeError::Internal(e.to_string()),
            StorageError::Serialization(e) => FiligreeError::Internal(e.to_string()),
            StorageError::Transaction(msg) => FiligreeError::Internal(msg),
            StorageError::Internal(msg) => FiligreeError::Internal(msg),
        }
    }
}
