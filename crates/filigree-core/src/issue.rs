//! The `Issue`, `Dependency`, `Comment`, and `Label` entities (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::FieldMap;

/// A unit of work (spec §3 "Issue").
///
/// INV-I1: `status` is valid for `type` per the currently loaded template
/// registry. INV-I2: `closed_at` is populated iff `status` has category
/// `done`. INV-I3: `parent_id`, if set, refers to an existing issue and does
/// not form a cycle. INV-I4: `priority ∈ [0,4]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: i32,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub parent_id: Option<String>,
    pub assignee: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub description: String,
    pub notes: String,
    #[serde(default)]
    pub fields: FieldMap,
}

impl Issue {
    /// `true` once `assignee` is non-empty.
    pub fn is_claimed(&self) -> bool {
        !self.assignee.is_empty()
    }
}

/// Builder used by tests and by `create_issue` to assemble an [`Issue`]
/// before the storage layer assigns it an id.
pub struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            issue: Issue {
                id: String::new(),
                title: title.into(),
                status: String::new(),
                priority: 2,
                issue_type: "task".to_string(),
                parent_id: None,
                assignee: String::new(),
                created_at: now,
                updated_at: now,
                closed_at: None,
                description: String::new(),
                notes: String::new(),
                fields: FieldMap::new(),
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.issue.id = id.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.issue.status = status.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.issue.priority = priority;
        self
    }

    pub fn issue_type(mut self, t: impl Into<String>) -> Self {
        self.issue.issue_type = t.into();
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.issue.parent_id = Some(parent_id.into());
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.issue.assignee = assignee.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.issue.description = description.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.issue.notes = notes.into();
        self
    }

    pub fn closed_at(mut self, closed_at: DateTime<Utc>) -> Self {
        self.issue.closed_at = Some(closed_at);
        self
    }

    pub fn fields(mut self, fields: FieldMap) -> Self {
        self.issue.fields = fields;
        self
    }

    pub fn build(self) -> Issue {
        self.issue
    }
}

/// A directed blocking edge (spec §3 "Dependency"). `issue_id` is blocked by
/// `depends_on_id`. INV-D1: the directed graph over issues (ignoring
/// done-category nodes) is acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(default = "default_dependency_type")]
    pub dep_type: String,
}

fn default_dependency_type() -> String {
    "blocks".to_string()
}

impl Dependency {
    pub fn blocks(issue_id: impl Into<String>, depends_on_id: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            depends_on_id: depends_on_id.into(),
            dep_type: default_dependency_type(),
        }
    }
}

/// Ordered, per-issue discussion entry (spec §3 "Comment").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A string tag attached to an issue (spec §3 "Label"). Primary key
/// `(issue_id, label)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub issue_id: String,
    pub label: String,
}

/// Labels starting with this prefix are reserved for engine-managed
/// pseudo-state and rejected by `add_label` (spec §3: "Reserved label names
/// ... are rejected at the engine").
pub const RESERVED_LABEL_PREFIXES: &[&str] = &["status:"];

pub fn is_reserved_label(label: &str) -> bool {
    RESERVED_LABEL_PREFIXES
        .iter()
        .any(|prefix| label.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_priority_and_type() {
        let issue = IssueBuilder::new("Test").build();
        assert_eq!(issue.priority, 2);
        assert_eq!(issue.issue_type, "task");
        assert!(!issue.is_claimed());
    }

    #[test]
    fn claimed_once_assignee_set() {
        let issue = IssueBuilder::new("Test").assignee("bot-a").build();
        assert!(issue.is_claimed());
    }

    #[test]
    fn reserved_labels_detected() {
        assert!(is_reserved_label("status:blocked"));
        assert!(!is_reserved_label("bug"));
    }

    #[test]
    fn dependency_defaults_to_blocks() {
        let dep = Dependency::blocks("demo-1", "demo-2");
        assert_eq!(dep.dep_type, "blocks");
    }
}
