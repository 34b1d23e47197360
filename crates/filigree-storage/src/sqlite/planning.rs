//! The planning engine (spec §4.5/C7): assembles a milestone/phase/step
//! tree in one transaction and reports per-phase progress. Grounded in the
//! teacher's transactional multi-insert pattern in
//! `beads-storage::sqlite::transaction`, generalized to a fixed three-level
//! hierarchy of plain issues.

use std::collections::HashMap;

use rusqlite::Connection;

use filigree_core::plan::{PhaseProgress, PlanPayload, PlanView, validate_plan_payload};
use filigree_core::template::Category;
use filigree_templates::registry::TemplateRegistry;

use crate::error::{Result, StorageError};
use crate::sqlite::dependencies::add_dependency_on_conn;
use crate::sqlite::issues::{CreateIssueParams, create_issue_on_conn, get_issue_on_conn};
use crate::sqlite::store::SqliteStore;

/// `create_plan` (spec §4.5): validates shape, then inside one transaction
/// creates a milestone issue, one phase issue per phase (`parent_id` =
/// milestone), and step issues per phase (`parent_id` = phase), with `deps`
/// entries resolved by title within the phase and materialized as
/// dependencies.
pub(crate) fn create_plan_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    prefix: &str,
    payload: &PlanPayload,
    actor: &str,
) -> Result<PlanView> {
    validate_plan_payload(payload).map_err(StorageError::Validation)?;

    let milestone = create_issue_on_conn(
        conn,
        registry,
        prefix,
        CreateIssueParams {
            title: payload.milestone.title.clone(),
            issue_type: Some("milestone".to_string()),
            description: Some(payload.milestone.description.clone()),
            ..Default::default()
        },
        actor,
    )?;

    for phase in &payload.phases {
        let phase_issue = create_issue_on_conn(
            conn,
            registry,
            prefix,
            CreateIssueParams {
                title: phase.title.clone(),
                issue_type: Some("phase".to_string()),
                parent_id: Some(milestone.id.clone()),
                description: Some(phase.description.clone()),
                ..Default::default()
            },
            actor,
        )?;

        let mut step_ids_by_title: HashMap<String, String> = HashMap::new();
        for step in &phase.steps {
            let step_issue = create_issue_on_conn(
                conn,
                registry,
                prefix,
                CreateIssueParams {
                    title: step.title.clone(),
                    issue_type: Some("step".to_string()),
                    parent_id: Some(phase_issue.id.clone()),
                    description: Some(step.description.clone()),
                    ..Default::default()
                },
                actor,
            )?;
            step_ids_by_title.insert(step.title.clone(), step_issue.id.clone());
        }

        for step in &phase.steps {
            let step_id = &step_ids_by_title[&step.title];
            for dep_title in &step.deps {
                let dep_id = &step_ids_by_title[dep_title];
                add_dependency_on_conn(conn, step_id, dep_id, actor)?;
            }
        }
    }

    get_plan_on_conn(conn, registry, &milestone.id)
}

/// `get_plan` (spec §4.5): the tree with per-phase `{total, completed,
/// ready}` step counts and overall `progress_pct`.
pub(crate) fn get_plan_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    milestone_id: &str,
) -> Result<PlanView> {
    get_issue_on_conn(conn, milestone_id)?;

    let phase_query = crate::sqlite::issues::IssueQuery {
        parent_id: Some(milestone_id.to_string()),
        limit: 10_000,
        ..Default::default()
    };
    let phases = crate::sqlite::issues::search_issues_on_conn(conn, &phase_query)?;

    let mut phase_progress = Vec::new();
    let mut grand_total = 0i64;
    let mut grand_completed = 0i64;

    for phase in &phases {
        let step_query = crate::sqlite::issues::IssueQuery {
            parent_id: Some(phase.id.clone()),
            limit: 10_000,
            ..Default::default()
        };
        let steps = crate::sqlite::issues::search_issues_on_conn(conn, &step_query)?;
        let snapshot = registry.current();
        let total = steps.len() as i64;
        let mut completed = 0i64;
        let mut ready = 0i64;
        for step in &steps {
            let category = snapshot
                .get_template(&step.issue_type)
                .map(|t| t.category_of(&step.status))
                .unwrap_or_else(|| Category::infer(&step.status));
            if category == Category::Done {
                completed += 1;
            } else if category == Category::Open
                && !crate::sqlite::dependencies::has_outstanding_blocker_with_registry(conn, registry, &step.id)?
            {
                ready += 1;
            }
        }
        grand_total += total;
        grand_completed += completed;
        phase_progress.push(PhaseProgress {
            phase_id: phase.id.clone(),
            title: phase.title.clone(),
            total,
            completed,
            ready,
        });
    }

    let progress_pct = if grand_total == 0 {
        0.0
    } else {
        round1(grand_completed as f64 / grand_total as f64 * 100.0)
    };

    Ok(PlanView {
        milestone_id: milestone_id.to_string(),
        phases: phase_progress,
        progress_pct,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl SqliteStore {
    pub fn create_plan_impl(
        &self,
        registry: &TemplateRegistry,
        prefix: &str,
        payload: &PlanPayload,
        actor: &str,
    ) -> Result<PlanView> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            create_plan_on_conn(&conn, registry, prefix, payload, actor)
        })
    }

    pub fn get_plan_impl(&self, registry: &TemplateRegistry, milestone_id: &str) -> Result<PlanView> {
        let conn = self.lock_conn()?;
        get_plan_on_conn(&conn, registry, milestone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filigree_core::plan::{MilestonePayload, PhasePayload, StepPayload};
    use std::path::Path;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap()
    }

    fn sample_payload() -> PlanPayload {
        PlanPayload {
            milestone: MilestonePayload { title: "Ship v1".into(), description: String::new() },
            phases: vec![PhasePayload {
                title: "Build".into(),
                description: String::new(),
                steps: vec![
                    StepPayload { title: "Design".into(), description: String::new(), deps: vec![] },
                    StepPayload {
                        title: "Implement".into(),
                        description: String::new(),
                        deps: vec!["Design".into()],
                    },
                ],
            }],
        }
    }

    #[test]
    fn create_plan_builds_full_tree() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let view = create_plan_on_conn(&conn, &reg, "demo", &sample_payload(), "agent-1").unwrap();
        assert_eq!(view.phases.len(), 1);
        assert_eq!(view.phases[0].total, 2);
        assert_eq!(view.progress_pct, 0.0);
    }

    #[test]
    fn dependent_step_is_not_ready_until_blocker_closes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let view = create_plan_on_conn(&conn, &reg, "demo", &sample_payload(), "agent-1").unwrap();
        // Only "Design" (no deps) should be ready; "Implement" is blocked.
        assert_eq!(view.phases[0].ready, 1);
    }

    #[test]
    fn progress_pct_updates_after_closing_a_step() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let view = create_plan_on_conn(&conn, &reg, "demo", &sample_payload(), "agent-1").unwrap();
        let step_query = crate::sqlite::issues::IssueQuery {
            parent_id: Some(view.phases[0].phase_id.clone()),
            limit: 10,
            ..Default::default()
        };
        let steps = crate::sqlite::issues::search_issues_on_conn(&conn, &step_query).unwrap();
        let design = steps.iter().find(|s| s.title == "Design").unwrap();
        crate::sqlite::issues::close_issue_on_conn(&conn, &reg, &design.id, None, "agent-1").unwrap();

        let updated = get_plan_on_conn(&conn, &reg, &view.milestone_id).unwrap();
        assert_eq!(updated.phases[0].completed, 1);
        assert_eq!(updated.progress_pct, 50.0);
    }
}
