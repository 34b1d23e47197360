//! Flow analytics (spec §4.8/C10): cycle time, lead time, and throughput,
//! all derived from the event log rather than materialized state.
//! Grounded in the teacher's `beads-storage::sqlite::queries` idiom of
//! read-only aggregate queries layered on top of the same tables the
//! mutating engines write to.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};

use filigree_core::events::EventType;
use filigree_core::template::Category;
use filigree_core::time::parse_datetime;
use filigree_templates::registry::TemplateRegistry;

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

/// Flow metrics over a trailing window (spec §4.8).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FlowMetrics {
    pub window_days: i64,
    /// Mean seconds between the first status transition out of the
    /// initial state and the first transition into a `done`-category
    /// state, across closed issues in the window. `None` if no issue in
    /// the window completed that full cycle.
    pub cycle_time_secs: Option<f64>,
    /// Mean seconds from `created` to the first `done`-category event,
    /// across issues in the window.
    pub lead_time_secs: Option<f64>,
    /// Count of `closed` events per calendar day (UTC, `YYYY-MM-DD`) over
    /// the window. Days with zero closes are omitted.
    pub throughput_per_day: BTreeMap<String, i64>,
}

struct IssueEventTimes {
    issue_type: String,
    created_at: Option<DateTime<Utc>>,
    first_status_change: Option<DateTime<Utc>>,
    status_changes: Vec<(DateTime<Utc>, String)>,
}

pub(crate) fn compute_flow_metrics_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    window_days: i64,
) -> Result<FlowMetrics> {
    let since = Utc::now() - Duration::days(window_days.max(0));
    let since_str = filigree_core::time::format_datetime(&since);

    let mut stmt = conn.prepare(
        "SELECT e.issue_id, e.event_type, e.new_value, e.created_at, i.issue_type
         FROM events e
         JOIN issues i ON i.id = e.issue_id
         WHERE e.created_at >= ?1
         ORDER BY e.issue_id, e.id ASC",
    )?;
    let rows = stmt.query_map(params![since_str], |row| {
        let issue_id: String = row.get(0)?;
        let event_type_str: String = row.get(1)?;
        let new_value: Option<String> = row.get(2)?;
        let created_at: String = row.get(3)?;
        let issue_type: String = row.get(4)?;
        Ok((issue_id, event_type_str, new_value, created_at, issue_type))
    })?;

    let mut by_issue: std::collections::HashMap<String, IssueEventTimes> = std::collections::HashMap::new();
    let mut closed_days: BTreeMap<String, i64> = BTreeMap::new();

    for row in rows {
        let (issue_id, event_type_str, new_value, created_at, issue_type) = row?;
        let event_type: EventType = event_type_str.parse().unwrap_or(EventType::Created);
        let created_at = parse_datetime(&created_at).unwrap_or_else(Utc::now);

        let entry = by_issue.entry(issue_id).or_insert_with(|| IssueEventTimes {
            issue_type: issue_type.clone(),
            created_at: None,
            first_status_change: None,
            status_changes: Vec::new(),
        });

        match event_type {
            EventType::Created => {
                entry.created_at.get_or_insert(created_at);
            }
            EventType::StatusChanged => {
                entry.first_status_change.get_or_insert(created_at);
                if let Some(new_status) = &new_value {
                    entry.status_changes.push((created_at, new_status.clone()));
                }
            }
            EventType::Closed => {
                let day = created_at.format("%Y-%m-%d").to_string();
                *closed_days.entry(day).or_insert(0) += 1;
                entry.created_at.get_or_insert(created_at);
            }
            _ => continue,
        }
    }

    let snapshot = registry.current();
    let mut cycle_times = Vec::new();
    let mut lead_times = Vec::new();

    for times in by_issue.values() {
        let done_at = times.status_changes.iter().find(|(_, status)| {
            let category = snapshot
                .get_template(&times.issue_type)
                .map(|t| t.category_of(status))
                .unwrap_or_else(|| Category::infer(status));
            category == Category::Done
        });

        if let (Some(started), Some((done_ts, _))) = (times.first_status_change, done_at) {
            let delta = (*done_ts - started).num_seconds() as f64;
            if delta >= 0.0 {
                cycle_times.push(delta);
            }
        }
        if let (Some(created), Some((done_ts, _))) = (times.created_at, done_at) {
            let delta = (*done_ts - created).num_seconds() as f64;
            if delta >= 0.0 {
                lead_times.push(delta);
            }
        }
    }

    Ok(FlowMetrics {
        window_days,
        cycle_time_secs: mean(&cycle_times),
        lead_time_secs: mean(&lead_times),
        throughput_per_day: closed_days,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl SqliteStore {
    pub fn compute_flow_metrics_impl(
        &self,
        registry: &TemplateRegistry,
        window_days: i64,
    ) -> Result<FlowMetrics> {
        let conn = self.lock_conn()?;
        compute_flow_metrics_on_conn(&conn, registry, window_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::issues::{CreateIssueParams, create_issue_on_conn, update_issue_on_conn, UpdateIssueParams};
    use std::path::Path;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap()
    }

    #[test]
    fn no_events_yields_no_metrics() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let metrics = compute_flow_metrics_on_conn(&conn, &reg, 30).unwrap();
        assert!(metrics.cycle_time_secs.is_none());
        assert!(metrics.lead_time_secs.is_none());
        assert!(metrics.throughput_per_day.is_empty());
    }

    #[test]
    fn closing_an_issue_produces_cycle_and_lead_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Fix it".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        update_issue_on_conn(
            &conn,
            &reg,
            &issue.id,
            UpdateIssueParams { status: Some("in_progress".into()), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        crate::sqlite::issues::close_issue_on_conn(&conn, &reg, &issue.id, None, "agent-1").unwrap();

        let metrics = compute_flow_metrics_on_conn(&conn, &reg, 30).unwrap();
        assert!(metrics.cycle_time_secs.is_some());
        assert!(metrics.lead_time_secs.is_some());
        assert_eq!(metrics.throughput_per_day.values().sum::<i64>(), 1);
    }

    #[test]
    fn events_outside_window_are_excluded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Old".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        conn.execute("UPDATE events SET created_at = '2000-01-01T00:00:00.000Z'", [])
            .unwrap();
        let metrics = compute_flow_metrics_on_conn(&conn, &reg, 30).unwrap();
        assert!(metrics.throughput_per_day.is_empty());
    }
}
