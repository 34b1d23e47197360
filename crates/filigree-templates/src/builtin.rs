//! Templates compiled into the engine (spec §4.3 layer 1: "built-in packs
//! compiled into the engine").
//!
//! Two packs ship built-in: `core` (task/bug/feature, the everyday types)
//! and `release` (a stricter, field-gated workflow used by release trains).
//! Project overlays (layers 2 and 3) can add types, or override these by
//! placing a same-named file under `.filigree/packs/` or
//! `.filigree/templates/`.

use filigree_core::template::{
    Category, Enforcement, FieldSchemaEntry, FieldType, Pack, State, Template, Transition,
};
use std::collections::HashMap;

pub fn builtin_packs() -> Vec<Pack> {
    vec![
        Pack {
            name: "core".into(),
            version: "1.0.0".into(),
            enabled: true,
            is_builtin: true,
            types: vec!["task".into(), "bug".into(), "feature".into()],
            guide: Some(
                "The default workflow pack: tasks, bugs, and features share a \
                 simple open -> in_progress -> closed shape, with bugs gated \
                 on a severity field before confirmation."
                    .into(),
            ),
            suggested_children: HashMap::new(),
        },
        Pack {
            name: "release".into(),
            version: "1.0.0".into(),
            enabled: true,
            is_builtin: true,
            types: vec!["release".into()],
            guide: Some(
                "A release train: planned -> frozen -> released, both hard \
                 transitions gated on the release's version field."
                    .into(),
            ),
            suggested_children: HashMap::new(),
        },
        Pack {
            name: "planning".into(),
            version: "1.0.0".into(),
            enabled: true,
            is_builtin: true,
            types: vec!["milestone".into(), "phase".into(), "step".into()],
            guide: Some(
                "The tree `create_plan` (C7) assembles: a milestone contains \
                 phases, a phase contains steps, all sharing the same \
                 open -> in_progress -> closed shape as `task`."
                    .into(),
            ),
            suggested_children: HashMap::new(),
        },
    ]
}

pub fn builtin_templates() -> Vec<Template> {
    vec![
        task_template(),
        bug_template(),
        feature_template(),
        release_template(),
        milestone_template(),
        phase_template(),
        step_template(),
    ]
}

fn task_template() -> Template {
    Template {
        type_name: "task".into(),
        display_name: "Task".into(),
        description: "A general unit of work.".into(),
        pack: "core".into(),
        initial_state: "open".into(),
        states: vec![
            State {
                name: "open".into(),
                category: Category::Open,
            },
            State {
                name: "in_progress".into(),
                category: Category::Wip,
            },
            State {
                name: "closed".into(),
                category: Category::Done,
            },
        ],
        transitions: vec![
            Transition {
                from_state: "open".into(),
                to_state: "in_progress".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "in_progress".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "open".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
        ],
        field_schema: vec![],
    }
}

fn bug_template() -> Template {
    Template {
        type_name: "bug".into(),
        display_name: "Bug".into(),
        description: "A reported defect.".into(),
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
                name: "in_progress".into(),
                category: Category::Wip,
            },
            State {
                name: "closed".into(),
                category: Category::Done,
            },
        ],
        transitions: vec![
            Transition {
                from_state: "triage".into(),
                to_state: "confirmed".into(),
                enforcement: Enforcement::Hard,
                requires_fields: vec!["severity".into()],
            },
            Transition {
                from_state: "confirmed".into(),
                to_state: "in_progress".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "in_progress".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "triage".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
        ],
        field_schema: vec![FieldSchemaEntry {
            name: "severity".into(),
            field_type: FieldType::Enum,
            enum_values: Some(vec![
                "critical".into(),
                "high".into(),
                "medium".into(),
                "low".into(),
            ]),
            required_at: Some("confirmed".into()),
        }],
    }
}

fn feature_template() -> Template {
    Template {
        type_name: "feature".into(),
        display_name: "Feature".into(),
        description: "A proposed or in-flight feature.".into(),
        pack: "core".into(),
        initial_state: "proposed".into(),
        states: vec![
            State {
                name: "proposed".into(),
                category: Category::Open,
            },
            State {
                name: "approved".into(),
                category: Category::Open,
            },
            State {
                name: "in_progress".into(),
                category: Category::Wip,
            },
            State {
                name: "closed".into(),
                category: Category::Done,
            },
        ],
        transitions: vec![
            Transition {
                from_state: "proposed".into(),
                to_state: "approved".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "approved".into(),
                to_state: "in_progress".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "in_progress".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
        ],
        field_schema: vec![],
    }
}

fn release_template() -> Template {
    Template {
        type_name: "release".into(),
        display_name: "Release".into(),
        description: "A scheduled software release.".into(),
        pack: "release".into(),
        initial_state: "planned".into(),
        states: vec![
            State {
                name: "planned".into(),
                category: Category::Open,
            },
            State {
                name: "frozen".into(),
                category: Category::Wip,
            },
            State {
                name: "released".into(),
                category: Category::Done,
            },
        ],
        transitions: vec![
            Transition {
                from_state: "planned".into(),
                to_state: "frozen".into(),
                enforcement: Enforcement::Hard,
                requires_fields: vec!["version".into()],
            },
            Transition {
                from_state: "frozen".into(),
                to_state: "released".into(),
                enforcement: Enforcement::Hard,
                requires_fields: vec!["version".into()],
            },
        ],
        field_schema: vec![FieldSchemaEntry {
            name: "version".into(),
            field_type: FieldType::Text,
            enum_values: None,
            required_at: Some("frozen".into()),
        }],
    }
}

/// Shared shape for the three planning-tree types (spec §4.5): a plain
/// open -> in_progress -> closed workflow, soft enforcement throughout
/// since plan steps carry no required fields of their own.
fn planning_leaf_template(type_name: &str, display_name: &str, description: &str) -> Template {
    Template {
        type_name: type_name.into(),
        display_name: display_name.into(),
        description: description.into(),
        pack: "planning".into(),
        initial_state: "open".into(),
        states: vec![
            State {
                name: "open".into(),
                category: Category::Open,
            },
            State {
                name: "in_progress".into(),
                category: Category::Wip,
            },
            State {
                name: "closed".into(),
                category: Category::Done,
            },
        ],
        transitions: vec![
            Transition {
                from_state: "open".into(),
                to_state: "in_progress".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "in_progress".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
            Transition {
                from_state: "open".into(),
                to_state: "closed".into(),
                enforcement: Enforcement::Soft,
                requires_fields: vec![],
            },
        ],
        field_schema: vec![],
    }
}

fn milestone_template() -> Template {
    planning_leaf_template("milestone", "Milestone", "A top-level planning goal.")
}

fn phase_template() -> Template {
    planning_leaf_template("phase", "Phase", "A phase within a milestone.")
}

fn step_template() -> Template {
    planning_leaf_template("step", "Step", "A single actionable step within a phase.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_template_self_checks_clean() {
        for t in builtin_templates() {
            let problems = t.self_check();
            assert!(problems.is_empty(), "{}: {problems:?}", t.type_name);
        }
    }

    #[test]
    fn pack_type_lists_match_templates() {
        let templates = builtin_templates();
        for pack in builtin_packs() {
            for type_name in &pack.types {
                assert!(templates.iter().any(|t| &t.type_name == type_name));
            }
        }
    }
}
