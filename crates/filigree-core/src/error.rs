//! The closed error taxonomy every boundary adapter translates from.
//!
//! Storage- and template-level errors convert into [`FiligreeError`] via
//! `From` impls in their own crates; this crate only defines the shape and
//! the product-level `code()` string each variant maps to.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FiligreeError>;

#[derive(Debug, Error)]
pub enum FiligreeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

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
    WouldCreateCycle {
        issue_id: String,
        depends_on_id: String,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FiligreeError {
    /// The closed taxonomy string from spec §7, used verbatim in every
    /// boundary adapter's error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            FiligreeError::Validation(_) => "validation_error",
            FiligreeError::NotFound { .. } => "not_found",
            FiligreeError::InvalidTransition { .. } => "invalid_transition",
            FiligreeError::AlreadyClaimed { .. } => "already_claimed",
            FiligreeError::WouldCreateCycle { .. } => "would_create_cycle",
            FiligreeError::InvalidPath(_) => "invalid_path",
            FiligreeError::Conflict(_) => "conflict",
            FiligreeError::Internal(_) => "internal",
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FiligreeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FiligreeError::Validation(msg.into())
    }

    /// CLI exit code per §6: 0 success, 1 validation/business error, 2 usage error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(FiligreeError::validation("x").code(), "validation_error");
        assert_eq!(
            FiligreeError::not_found("issue", "demo-1").code(),
            "not_found"
        );
        assert_eq!(
            FiligreeError::AlreadyClaimed {
                current_assignee: "bot-a".into()
            }
            .code(),
            "already_claimed"
        );
    }
}
