//! The summary generator (spec §4.7/C9): a deterministic, idempotent
//! markdown snapshot of project state. Grounded in the teacher's pattern
//! of a read-only aggregate pass over the same tables the mutating
//! engines write (mirrors `beads-storage::sqlite::queries`), rendered to
//! markdown rather than returned as a struct since its only consumer is
//! `<project>/.filigree/context.md` (spec §6).

use std::path::Path;

use rusqlite::Connection;

use filigree_core::template::Category;
use filigree_templates::registry::TemplateRegistry;

use crate::error::Result;
use crate::sqlite::events::get_recent_events_on_conn;
use crate::sqlite::issues::{IssueQuery, search_issues_on_conn};
use crate::sqlite::store::SqliteStore;

const READY_TOP_N: i64 = 10;
const IN_PROGRESS_TOP_N: i64 = 20;
const RECENT_EVENTS_N: i64 = 15;

/// Builds the markdown snapshot document (spec §4.7). Pure and
/// deterministic given the database state: callers decide what to do with
/// the result (write to disk, serve over HTTP, etc).
pub(crate) fn render_summary_markdown(conn: &Connection, registry: &TemplateRegistry) -> Result<String> {
    let snapshot = registry.current();
    let all = search_issues_on_conn(
        conn,
        &IssueQuery { limit: 100_000, ..Default::default() },
    )?;

    let mut open_count = 0i64;
    let mut wip_count = 0i64;
    let mut done_count = 0i64;
    for issue in &all {
        let category = snapshot
            .get_template(&issue.issue_type)
            .map(|t| t.category_of(&issue.status))
            .unwrap_or_else(|| Category::infer(&issue.status));
        match category {
            Category::Open => open_count += 1,
            Category::Wip => wip_count += 1,
            Category::Done => done_count += 1,
        }
    }

    let ready = crate::sqlite::dependencies::get_ready_on_conn(conn, registry, None, Some(READY_TOP_N))?;

    let mut in_progress: Vec<_> = all
        .iter()
        .filter(|issue| {
            snapshot
                .get_template(&issue.issue_type)
                .map(|t| t.category_of(&issue.status))
                .unwrap_or_else(|| Category::infer(&issue.status))
                == Category::Wip
        })
        .collect();
    in_progress.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
    in_progress.truncate(IN_PROGRESS_TOP_N as usize);

    let recent_events = get_recent_events_on_conn(conn, RECENT_EVENTS_N)?;

    let mut md = String::new();
    md.push_str("# Project Summary\n\n");
    md.push_str("_Regenerated automatically; not authoritative._\n\n");

    md.push_str("## Vitals\n\n");
    md.push_str(&format!("- Open: {open_count}\n"));
    md.push_str(&format!("- In progress: {wip_count}\n"));
    md.push_str(&format!("- Done: {done_count}\n\n"));

    md.push_str("## Ready queue\n\n");
    if ready.is_empty() {
        md.push_str("_Nothing ready._\n\n");
    } else {
        for issue in &ready {
            md.push_str(&format!(
                "- `{}` [{}] P{} — {}\n",
                issue.id, issue.issue_type, issue.priority, issue.title
            ));
        }
        md.push('\n');
    }

    md.push_str("## In progress\n\n");
    if in_progress.is_empty() {
        md.push_str("_Nothing in progress._\n\n");
    } else {
        for issue in &in_progress {
            let assignee = if issue.assignee.is_empty() { "unassigned" } else { &issue.assignee };
            md.push_str(&format!(
                "- `{}` [{}] P{} — {} ({})\n",
                issue.id, issue.issue_type, issue.priority, issue.title, assignee
            ));
        }
        md.push('\n');
    }

    md.push_str("## Recent changes\n\n");
    if recent_events.is_empty() {
        md.push_str("_No events yet._\n");
    } else {
        for event in &recent_events {
            md.push_str(&format!(
                "- `{}` {} by {} at {}\n",
                event.issue_id,
                event.event_type,
                event.actor,
                filigree_core::time::format_datetime(&event.created_at),
            ));
        }
    }

    Ok(md)
}

impl SqliteStore {
    /// Regenerates `<project_root>/.filigree/context.md` in a single
    /// write. Never returns an error to the caller: a failure here must
    /// not fail the mutation that triggered it (spec §4.7), so it is
    /// logged and swallowed.
    pub fn refresh_summary(&self, registry: &TemplateRegistry, project_root: &Path) {
        let rendered = {
            let conn = match self.lock_conn() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to lock database while refreshing summary");
                    return;
                }
            };
            render_summary_markdown(&conn, registry)
        };

        let markdown = match rendered {
            Ok(md) => md,
            Err(e) => {
                tracing::warn!(error = %e, "failed to render project summary");
                return;
            }
        };

        let path = project_root.join(".filigree").join("context.md");
        if let Err(e) = std::fs::write(&path, markdown) {
            tracing::warn!(error = %e, path = %path.display(), "failed to write project summary");
        }
    }

    /// Renders the summary without writing it, for boundary adapters that
    /// want to serve it directly (e.g. an HTTP endpoint).
    pub fn render_summary_impl(&self, registry: &TemplateRegistry) -> Result<String> {
        let conn = self.lock_conn()?;
        render_summary_markdown(&conn, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::issues::{CreateIssueParams, create_issue_on_conn};
    use std::path::Path;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap()
    }

    #[test]
    fn empty_project_renders_placeholders() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let md = render_summary_markdown(&conn, &reg).unwrap();
        assert!(md.contains("Open: 0"));
        assert!(md.contains("Nothing ready"));
        assert!(md.contains("No events yet"));
    }

    #[test]
    fn new_issue_appears_in_vitals_and_ready_queue() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Fix the thing".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();

        let md = render_summary_markdown(&conn, &reg).unwrap();
        assert!(md.contains("Open: 1"));
        assert!(md.contains("Fix the thing"));
        assert!(md.contains("created"));
    }

    #[test]
    fn rendering_is_deterministic_for_unchanged_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Stable".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        let first = render_summary_markdown(&conn, &reg).unwrap();
        let second = render_summary_markdown(&conn, &reg).unwrap();
        assert_eq!(first, second);
    }
}
