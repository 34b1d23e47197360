//! Planning payload shapes for `create_plan`/`get_plan` (spec §4.5).

use serde::{Deserialize, Serialize};

/// The payload accepted by `create_plan`. Steps reference each other by
/// title within the same phase (resolved to ids after creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPayload {
    pub milestone: MilestonePayload,
    pub phases: Vec<PhasePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestonePayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Titles of other steps in the same phase this step depends on.
    #[serde(default)]
    pub deps: Vec<String>,
}

/// Per-phase progress counters returned by `get_plan` (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase_id: String,
    pub title: String,
    pub total: i64,
    pub completed: i64,
    pub ready: i64,
}

/// The full tree returned by `get_plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub milestone_id: String,
    pub phases: Vec<PhaseProgress>,
    /// `round(completed/total*100, 1)` over the whole milestone.
    pub progress_pct: f64,
}

/// Validates a plan payload's shape before any entity is created (spec
/// §4.5, §13 resolution #3: step titles must be unique within a phase since
/// `deps` resolves by title).
///
/// Returns a human-readable validation error citing the phase/step index,
/// per spec §4.5 ("descriptive errors cite phase/step index").
pub fn validate_plan_payload(payload: &PlanPayload) -> Result<(), String> {
    if payload.milestone.title.trim().is_empty() {
        return Err("milestone title must not be empty".to_string());
    }
    if payload.phases.is_empty() {
        return Err("plan must have at least one phase".to_string());
    }
    for (phase_idx, phase) in payload.phases.iter().enumerate() {
        if phase.title.trim().is_empty() {
            return Err(format!("phase[{phase_idx}] title must not be empty"));
        }
        if phase.steps.is_empty() {
            return Err(format!("phase[{phase_idx}] must have at least one step"));
        }
        let mut seen_titles = std::collections::HashSet::new();
        for (step_idx, step) in phase.steps.iter().enumerate() {
            if step.title.trim().is_empty() {
                return Err(format!(
                    "phase[{phase_idx}].step[{step_idx}] title must not be empty"
                ));
            }
            if !seen_titles.insert(step.title.as_str()) {
                return Err(format!(
                    "phase[{phase_idx}] has duplicate step title {:?}; titles must be unique within a phase",
                    step.title
                ));
            }
        }
        for (step_idx, step) in phase.steps.iter().enumerate() {
            for dep_title in &step.deps {
                if !phase.steps.iter().any(|s| &s.title == dep_title) {
                    return Err(format!(
                        "phase[{phase_idx}].step[{step_idx}] depends on unknown step title {:?}",
                        dep_title
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> PlanPayload {
        PlanPayload {
            milestone: MilestonePayload {
                title: "M1".into(),
                description: String::new(),
            },
            phases: vec![PhasePayload {
                title: "P1".into(),
                description: String::new(),
                steps: vec![
                    StepPayload {
                        title: "S1".into(),
                        description: String::new(),
                        deps: vec![],
                    },
                    StepPayload {
                        title: "S2".into(),
                        description: String::new(),
                        deps: vec!["S1".into()],
                    },
                ],
            }],
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(validate_plan_payload(&sample_payload()).is_ok());
    }

    #[test]
    fn empty_milestone_title_rejected() {
        let mut p = sample_payload();
        p.milestone.title = "  ".into();
        assert!(validate_plan_payload(&p).is_err());
    }

    #[test]
    fn duplicate_step_titles_rejected() {
        let mut p = sample_payload();
        p.phases[0].steps[1].title = "S1".into();
        let err = validate_plan_payload(&p).unwrap_err();
        assert!(err.contains("duplicate step title"));
    }

    #[test]
    fn unknown_dep_title_rejected() {
        let mut p = sample_payload();
        p.phases[0].steps[1].deps = vec!["Nonexistent".into()];
        assert!(validate_plan_payload(&p).is_err());
    }
}
