//! Transition validation (spec §4.3).

use filigree_core::error::FiligreeError;
use filigree_core::issue::Issue;
use filigree_core::template::{Category, Enforcement, Template};

/// The result of a successful transition check: the issue's mutation may
/// proceed, along with any non-fatal advisories (spec §7: "Non-fatal
/// advisories ... surface as `warnings` on success, never failures").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub warnings: Vec<String>,
}

/// Returns whether `issue` has a value for `field_name`, checking both
/// well-known top-level attributes and the generic `fields` map (spec
/// §4.3 step 3: "check the field is set on the issue (either in the
/// top-level attribute or `fields` map)").
fn issue_has_field(issue: &Issue, field_name: &str) -> bool {
    match field_name {
        "title" => !issue.title.trim().is_empty(),
        "assignee" => !issue.assignee.trim().is_empty(),
        "description" => !issue.description.trim().is_empty(),
        "notes" => !issue.notes.trim().is_empty(),
        "parent_id" => issue.parent_id.is_some(),
        other => issue
            .fields
            .get(other)
            .map(|v| !v.is_null())
            .unwrap_or(false),
    }
}

fn missing_fields(issue: &Issue, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|f| !issue_has_field(issue, f))
        .cloned()
        .collect()
}

/// Validates a status change from `current_status` to `new_status` for
/// `issue` under `template` (spec §4.3 steps 1–4).
///
/// `template` is `None` when the type is unknown to the registry: unknown
/// types are tolerated (not validated) unless `skip_transition_check` is
/// already true, matching step 1's "unknown types are tolerated but not
/// validated".
pub fn validate_transition(
    template: Option<&Template>,
    current_status: &str,
    new_status: &str,
    issue: &Issue,
    skip_transition_check: bool,
) -> Result<TransitionOutcome, FiligreeError> {
    if skip_transition_check {
        return Ok(TransitionOutcome::default());
    }

    let Some(template) = template else {
        return Ok(TransitionOutcome {
            warnings: vec![format!(
                "issue type is unknown to the template registry; transition to {new_status:?} was not validated"
            )],
        });
    };

    // Step 2: look up the declared transition.
    match template.transition(current_status, new_status) {
        Some(transition) => {
            // Step 3: required-fields gate, only enforced for `hard`.
            let missing = missing_fields(issue, &transition.requires_fields);
            if !missing.is_empty() && transition.enforcement == Enforcement::Hard {
                return Err(FiligreeError::InvalidTransition {
                    from: current_status.to_string(),
                    to: new_status.to_string(),
                    valid_transitions: outbound_names(template, current_status),
                    missing_fields: missing,
                });
            }
            let warnings = if !missing.is_empty() {
                vec![format!(
                    "transition applied, but recommended fields are missing: {missing:?}"
                )]
            } else {
                Vec::new()
            };
            Ok(TransitionOutcome { warnings })
        }
        None => {
            // No declared transition record. Soft-enforcement types still
            // allow the change; hard types refuse.
            let any_hard = template
                .transitions
                .iter()
                .any(|t| t.enforcement == Enforcement::Hard);
            if any_hard {
                Err(FiligreeError::InvalidTransition {
                    from: current_status.to_string(),
                    to: new_status.to_string(),
                    valid_transitions: outbound_names(template, current_status),
                    missing_fields: Vec::new(),
                })
            } else {
                Ok(TransitionOutcome {
                    warnings: vec![format!(
                        "no declared transition {current_status:?} -> {new_status:?}; applied because {:?} uses soft enforcement",
                        template.type_name
                    )],
                })
            }
        }
    }
}

fn outbound_names(template: &Template, from_state: &str) -> Vec<String> {
    template
        .transitions
        .iter()
        .filter(|t| t.from_state == from_state)
        .map(|t| t.to_state.clone())
        .collect()
}

/// One outbound transition as reported by `get_valid_transitions` (spec
/// §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransitionInfo {
    pub to: String,
    pub category: Category,
    pub enforcement: Enforcement,
    pub requires_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub ready: bool,
}

/// `get_valid_transitions(issue)` (spec §4.3): the list of outbound
/// transitions from the issue's current state.
pub fn get_valid_transitions(template: &Template, issue: &Issue) -> Vec<ValidTransitionInfo> {
    template
        .transitions
        .iter()
        .filter(|t| t.from_state == issue.status)
        .map(|t| {
            let missing = missing_fields(issue, &t.requires_fields);
            let ready = missing.is_empty();
            ValidTransitionInfo {
                to: t.to_state.clone(),
                category: template.category_of(&t.to_state),
                enforcement: t.enforcement,
                requires_fields: t.requires_fields.clone(),
                missing_fields: missing,
                ready,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use filigree_core::issue::IssueBuilder;

    fn bug() -> Template {
        builtin::builtin_templates()
            .into_iter()
            .find(|t| t.type_name == "bug")
            .unwrap()
    }

    fn release() -> Template {
        builtin::builtin_templates()
            .into_iter()
            .find(|t| t.type_name == "release")
            .unwrap()
    }

    #[test]
    fn hard_transition_without_required_field_fails() {
        let issue = IssueBuilder::new("Bug").status("triage").build();
        let err = validate_transition(Some(&bug()), "triage", "confirmed", &issue, false)
            .unwrap_err();
        match err {
            FiligreeError::InvalidTransition { missing_fields, .. } => {
                assert_eq!(missing_fields, vec!["severity".to_string()]);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn hard_transition_with_required_field_succeeds() {
        let mut issue = IssueBuilder::new("Bug").status("triage").build();
        issue.fields.insert("severity", serde_json::json!("high"));
        let outcome =
            validate_transition(Some(&bug()), "triage", "confirmed", &issue, false).unwrap();
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn skip_check_bypasses_validation() {
        let issue = IssueBuilder::new("Bug").status("triage").build();
        let outcome =
            validate_transition(Some(&bug()), "triage", "confirmed", &issue, true).unwrap();
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn release_frozen_without_version_fails_s5() {
        let issue = IssueBuilder::new("Release 1.0")
            .issue_type("release")
            .status("planned")
            .build();
        let err =
            validate_transition(Some(&release()), "planned", "frozen", &issue, false).unwrap_err();
        match err {
            FiligreeError::InvalidTransition {
                missing_fields,
                valid_transitions,
                ..
            } => {
                assert_eq!(missing_fields, vec!["version".to_string()]);
                assert_eq!(valid_transitions, vec!["frozen".to_string()]);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn get_valid_transitions_reports_readiness() {
        let issue = IssueBuilder::new("Bug").status("triage").build();
        let transitions = get_valid_transitions(&bug(), &issue);
        assert_eq!(transitions.len(), 2); // triage -> confirmed, triage -> closed
        let to_confirmed = transitions.iter().find(|t| t.to == "confirmed").unwrap();
        assert!(!to_confirmed.ready);
        assert_eq!(to_confirmed.missing_fields, vec!["severity".to_string()]);
    }

    #[test]
    fn unknown_type_is_tolerated_with_warning() {
        let issue = IssueBuilder::new("Mystery").status("whatever").build();
        let outcome = validate_transition(None, "whatever", "done", &issue, false).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
    }
}
