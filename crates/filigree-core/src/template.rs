//! Template and pack data shapes (spec §3 "Template", "Pack"; §4.3).
//!
//! This crate only defines the shapes. Loading, layering, and transition
//! validation live in `filigree-templates`, which depends on these types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The universal state classification (spec §4.3: "State categories are
/// used universally ... so cross-type queries can classify without naming
/// states").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Open,
    Wip,
    Done,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Open => "open",
            Category::Wip => "wip",
            Category::Done => "done",
        }
    }

    /// Infers a category for a state name not declared by any loaded
    /// template (spec §4.3: "Unknown state names are inferred ... for
    /// tolerance of old data").
    pub fn infer(state_name: &str) -> Category {
        match state_name {
            "closed" | "done" | "completed" => Category::Done,
            _ => Category::Open,
        }
    }
}

/// One state in a type's workflow (spec §3: `states` entries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub category: Category,
}

/// Field type for a template's `field_schema` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Enum,
    List,
}

/// One field declared by a type's `field_schema` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchemaEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// The state name at which this field becomes required, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_at: Option<String>,
}

/// Transition enforcement level (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    Hard,
    Soft,
}

/// One declared transition in a type's workflow (spec §3: `transitions`
/// entries).
///
/// INV-T1: every transition references states declared in the same
/// template. INV-T2: every `requires_fields` entry appears in
/// `field_schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from_state: String,
    pub to_state: String,
    pub enforcement: Enforcement,
    #[serde(default)]
    pub requires_fields: Vec<String>,
}

/// A type-scoped workflow definition (spec §3 "Template").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "type")]
    pub type_name: String,
    pub display_name: String,
    pub description: String,
    pub pack: String,
    pub initial_state: String,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub field_schema: Vec<FieldSchemaEntry>,
}

impl Template {
    /// Validates the template's own internal invariants (INV-T1, INV-T2).
    /// Returns a list of human-readable violations; empty means valid.
    pub fn self_check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let state_names: std::collections::HashSet<&str> =
            self.states.iter().map(|s| s.name.as_str()).collect();
        let field_names: std::collections::HashSet<&str> = self
            .field_schema
            .iter()
            .map(|f| f.name.as_str())
            .collect();

        if !state_names.contains(self.initial_state.as_str()) {
            problems.push(format!(
                "initial_state {:?} is not declared in states",
                self.initial_state
            ));
        }

        for t in &self.transitions {
            if !state_names.contains(t.from_state.as_str()) {
                problems.push(format!(
                    "transition references undeclared from_state {:?}",
                    t.from_state
                ));
            }
            if !state_names.contains(t.to_state.as_str()) {
                problems.push(format!(
                    "transition references undeclared to_state {:?}",
                    t.to_state
                ));
            }
            for field in &t.requires_fields {
                if !field_names.contains(field.as_str()) {
                    problems.push(format!(
                        "transition requires_fields references undeclared field {:?}",
                        field
                    ));
                }
            }
        }
        problems
    }

    pub fn category_of(&self, state_name: &str) -> Category {
        self.states
            .iter()
            .find(|s| s.name == state_name)
            .map(|s| s.category)
            .unwrap_or_else(|| Category::infer(state_name))
    }

    /// The first state with category `done`, used by `close_issue` (spec
    /// §4.1).
    pub fn terminal_state(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.category == Category::Done)
            .map(|s| s.name.as_str())
    }

    pub fn transition(&self, from: &str, to: &str) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from_state == from && t.to_state == to)
    }

    pub fn field_schema_for(&self, name: &str) -> Option<&FieldSchemaEntry> {
        self.field_schema.iter().find(|f| f.name == name)
    }
}

/// A grouping of templates (spec §3 "Pack").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub is_builtin: bool,
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
    #[serde(default)]
    pub suggested_children: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_template() -> Template {
        Template {
            type_name: "bug".into(),
            display_name: "Bug".into(),
            description: "A defect".into(),
            pack: "core".into(),
            initial_state: "triage".into(),
            states: vec![
                State {
                    name: "triage".into(),
                    category: Category::Open,
                },
                State {
                    name: "confirmed".into(),
                    category: Category::Open,
                },
                State {
                    name: "closed".into(),
                    category: Category::Done,
                },
            ],
            transitions: vec![Transition {
                from_state: "triage".into(),
                to_state: "confirmed".into(),
                enforcement: Enforcement::Hard,
                requires_fields: vec!["severity".into()],
            }],
            field_schema: vec![FieldSchemaEntry {
                name: "severity".into(),
                field_type: FieldType::Enum,
                enum_values: Some(vec!["low".into(), "high".into()]),
                required_at: Some("confirmed".into()),
            }],
        }
    }

    #[test]
    fn self_check_passes_for_well_formed_template() {
        assert!(sample_template().self_check().is_empty());
    }

    #[test]
    fn self_check_flags_undeclared_state() {
        let mut t = sample_template();
        t.transitions.push(Transition {
            from_state: "confirmed".into(),
            to_state: "nonexistent".into(),
            enforcement: Enforcement::Soft,
            requires_fields: vec![],
        });
        assert!(!t.self_check().is_empty());
    }

    #[test]
    fn terminal_state_is_first_done_category() {
        assert_eq!(sample_template().terminal_state(), Some("closed"));
    }

    #[test]
    fn category_inference_for_unknown_state() {
        let t = sample_template();
        assert_eq!(t.category_of("some_unlisted_state"), Category::Open);
        assert_eq!(Category::infer("done"), Category::Done);
    }
}
