//! The append-only event log entity and its closed type taxonomy (spec
//! §3 "Event", §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An append-only audit record (spec §3 "Event").
///
/// INV-E1: events are never updated or deleted except by `compact_events`
/// and `archive_closed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub issue_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The closed event-type taxonomy (spec §4.4). Unlike `Status`/`IssueType`
/// in the teacher, this has no `Custom` escape hatch: the event log is an
/// internal audit trail, never user-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    StatusChanged,
    PriorityChanged,
    TitleChanged,
    AssigneeChanged,
    DescriptionChanged,
    NotesChanged,
    ParentChanged,
    FieldsChanged,
    Claimed,
    Released,
    CommentAdded,
    LabelAdded,
    LabelRemoved,
    DependencyAdded,
    DependencyRemoved,
    Closed,
    Reopened,
    Archived,
    FindingCreated,
    FindingUpdated,
    AssociationCreated,
    FileMetadataUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::StatusChanged => "status_changed",
            EventType::PriorityChanged => "priority_changed",
            EventType::TitleChanged => "title_changed",
            EventType::AssigneeChanged => "assignee_changed",
            EventType::DescriptionChanged => "description_changed",
            EventType::NotesChanged => "notes_changed",
            EventType::ParentChanged => "parent_changed",
            EventType::FieldsChanged => "fields_changed",
            EventType::Claimed => "claimed",
            EventType::Released => "released",
            EventType::CommentAdded => "comment_added",
            EventType::LabelAdded => "label_added",
            EventType::LabelRemoved => "label_removed",
            EventType::DependencyAdded => "dependency_added",
            EventType::DependencyRemoved => "dependency_removed",
            EventType::Closed => "closed",
            EventType::Reopened => "reopened",
            EventType::Archived => "archived",
            EventType::FindingCreated => "finding_created",
            EventType::FindingUpdated => "finding_updated",
            EventType::AssociationCreated => "association_created",
            EventType::FileMetadataUpdate => "file_metadata_update",
        }
    }

    /// Events `undo_last` knows how to invert (spec §4.1).
    /// `released` is deliberately excluded: releasing a claim has no
    /// well-defined "prior assignee" worth restoring automatically.
    pub const REVERSIBLE: &'static [EventType] = &[
        EventType::StatusChanged,
        EventType::PriorityChanged,
        EventType::TitleChanged,
        EventType::Claimed,
        EventType::CommentAdded,
        EventType::LabelAdded,
    ];

    pub fn is_reversible(&self) -> bool {
        Self::REVERSIBLE.contains(self)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct ParseEventTypeError(pub String);

impl std::str::FromStr for EventType {
    type Err = ParseEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => EventType::Created,
            "status_changed" => EventType::StatusChanged,
            "priority_changed" => EventType::PriorityChanged,
            "title_changed" => EventType::TitleChanged,
            "assignee_changed" => EventType::AssigneeChanged,
            "description_changed" => EventType::DescriptionChanged,
            "notes_changed" => EventType::NotesChanged,
            "parent_changed" => EventType::ParentChanged,
            "fields_changed" => EventType::FieldsChanged,
            "claimed" => EventType::Claimed,
            "released" => EventType::Released,
            "comment_added" => EventType::CommentAdded,
            "label_added" => EventType::LabelAdded,
            "label_removed" => EventType::LabelRemoved,
            "dependency_added" => EventType::DependencyAdded,
            "dependency_removed" => EventType::DependencyRemoved,
            "closed" => EventType::Closed,
            "reopened" => EventType::Reopened,
            "archived" => EventType::Archived,
            "finding_created" => EventType::FindingCreated,
            "finding_updated" => EventType::FindingUpdated,
            "association_created" => EventType::AssociationCreated,
            "file_metadata_update" => EventType::FileMetadataUpdate,
            other => return Err(ParseEventTypeError(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_is_not_reversible() {
        assert!(!EventType::Released.is_reversible());
        assert!(EventType::Claimed.is_reversible());
    }

    #[test]
    fn round_trips_through_str() {
        for ty in [
            EventType::Created,
            EventType::StatusChanged,
            EventType::Claimed,
            EventType::FileMetadataUpdate,
        ] {
            let s = ty.as_str();
            let parsed: EventType = s.parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn rejects_unknown() {
        assert!("bogus".parse::<EventType>().is_err());
    }
}
