//! The dependency engine (spec §4.2/C6): cycle-checked edge insertion,
//! ready/blocked derivation, and critical-path analysis. Grounded in the
//! teacher's `beads-storage::sqlite::dependencies`.

use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::{Connection, params};

use filigree_core::events::EventType;
use filigree_core::issue::Issue;
use filigree_core::template::Category;
use filigree_templates::registry::TemplateRegistry;

use crate::error::{Result, StorageError};
use crate::sqlite::events::emit_event;
use crate::sqlite::issues::get_issue_on_conn;
use crate::sqlite::store::SqliteStore;

/// `add_dependency` (spec §4.2): refuses self-dependency, unknown ids, and
/// any edge that would close a cycle, via reverse reachability from
/// `depends_on_id`.
pub(crate) fn add_dependency_on_conn(
    conn: &Connection,
    issue_id: &str,
    depends_on_id: &str,
    actor: &str,
) -> Result<()> {
    if issue_id == depends_on_id {
        return Err(StorageError::Validation("an issue cannot depend on itself".into()));
    }
    get_issue_on_conn(conn, issue_id)?;
    get_issue_on_conn(conn, depends_on_id)?;

    if reachable_via_reverse_edges(conn, depends_on_id, issue_id)? {
        return Err(StorageError::CycleDetected {
            issue_id: issue_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
        });
    }

    conn.execute(
        "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, dep_type) VALUES (?1, ?2, 'blocks')",
        params![issue_id, depends_on_id],
    )?;
    emit_event(
        conn,
        issue_id,
        EventType::DependencyAdded,
        actor,
        None,
        Some(depends_on_id),
        None,
    )?;
    Ok(())
}

/// Reverse reachability search: starting from `depends_on_id`, can we reach
/// `target` by repeatedly following existing `depends_on_id -> issue_id`
/// edges backward? If so, adding `issue_id -> depends_on_id` would close a
/// cycle (spec §4.2).
fn reachable_via_reverse_edges(conn: &Connection, start: &str, target: &str) -> Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(start.to_string());
    visited.insert(start.to_string());

    while let Some(current) = queue.pop_front() {
        if current == target {
            return Ok(true);
        }
        let mut stmt = conn.prepare("SELECT depends_on_id FROM dependencies WHERE issue_id = ?1")?;
        let rows = stmt.query_map(params![current], |row| row.get::<_, String>(0))?;
        for row in rows {
            let next = row?;
            if visited.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    Ok(false)
}

/// `remove_dependency` (spec §4.2): idempotent, absent edges report
/// success.
pub(crate) fn remove_dependency_on_conn(
    conn: &Connection,
    issue_id: &str,
    depends_on_id: &str,
    actor: &str,
) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM dependencies WHERE issue_id = ?1 AND depends_on_id = ?2",
        params![issue_id, depends_on_id],
    )?;
    if affected > 0 {
        emit_event(
            conn,
            issue_id,
            EventType::DependencyRemoved,
            actor,
            Some(depends_on_id),
            None,
            None,
        )?;
    }
    Ok(())
}

fn category_of(snapshot_templates_lookup: &TemplateRegistry, issue: &Issue) -> Category {
    snapshot_templates_lookup
        .current()
        .get_template(&issue.issue_type)
        .map(|t| t.category_of(&issue.status))
        .unwrap_or_else(|| Category::infer(&issue.status))
}

fn blocking_issue_ids(conn: &Connection, issue_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT depends_on_id FROM dependencies WHERE issue_id = ?1")?;
    let rows = stmt.query_map(params![issue_id], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Registry-aware outstanding-blocker check, used by `get_ready`/`get_blocked`
/// and the close/plan paths so category classification follows each
/// blocker's own template instead of the universal state-name inference.
pub(crate) fn has_outstanding_blocker_with_registry(
    conn: &Connection,
    registry: &TemplateRegistry,
    issue_id: &str,
) -> Result<bool> {
    for blocker_id in blocking_issue_ids(conn, issue_id)? {
        if let Ok(blocker) = get_issue_on_conn(conn, &blocker_id) {
            if category_of(registry, &blocker) != Category::Done {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `get_ready` (spec §4.2): issues in an `open`-category state with no
/// outstanding blocker, ordered `(priority asc, created_at asc)`.
pub(crate) fn get_ready_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    type_filter: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<Issue>> {
    let mut sql = "SELECT id, title, status, priority, issue_type, parent_id, assignee, \
        created_at, updated_at, closed_at, description, notes, fields \
        FROM issues".to_string();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(t) = type_filter {
        sql.push_str(" WHERE issue_type = ?");
        bind.push(Box::new(t.to_string()));
    }
    sql.push_str(" ORDER BY priority ASC, created_at ASC");

    let mut stmt = conn.prepare(&sql)?;
    let bind_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(bind_refs.as_slice(), crate::sqlite::issues::scan_issue)?;

    let mut ready = Vec::new();
    for row in rows {
        let issue = row?;
        if category_of(registry, &issue) != Category::Open {
            continue;
        }
        if has_outstanding_blocker_with_registry(conn, registry, &issue.id)? {
            continue;
        }
        ready.push(issue);
        if let Some(limit) = limit {
            if ready.len() as i64 >= limit {
                break;
            }
        }
    }
    Ok(ready)
}

/// One blocking-issue summary as returned by `get_blocked` (spec §4.2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockedIssue {
    pub issue: Issue,
    pub blockers: Vec<Issue>,
}

/// `get_blocked` (spec §4.2): `open`-category issues with ≥1 outstanding
/// blocker, plus blocking-issue summaries.
pub(crate) fn get_blocked_on_conn(conn: &Connection, registry: &TemplateRegistry) -> Result<Vec<BlockedIssue>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, priority, issue_type, parent_id, assignee, \
         created_at, updated_at, closed_at, description, notes, fields FROM issues",
    )?;
    let rows = stmt.query_map([], crate::sqlite::issues::scan_issue)?;

    let mut out = Vec::new();
    for row in rows {
        let issue = row?;
        if category_of(registry, &issue) != Category::Open {
            continue;
        }
        let blocker_ids = blocking_issue_ids(conn, &issue.id)?;
        let mut outstanding = Vec::new();
        for blocker_id in blocker_ids {
            if let Ok(blocker) = get_issue_on_conn(conn, &blocker_id) {
                if category_of(registry, &blocker) != Category::Done {
                    outstanding.push(blocker);
                }
            }
        }
        if !outstanding.is_empty() {
            out.push(BlockedIssue { issue, blockers: outstanding });
        }
    }
    Ok(out)
}

/// `get_critical_path` (spec §4.2): longest dependency chain (by node
/// count) over the subgraph of non-done issues, topological order then
/// longest-path relaxation, ties broken by lower summed priority.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CriticalPath {
    pub issue_ids: Vec<String>,
    pub length: usize,
}

pub(crate) fn get_critical_path_on_conn(conn: &Connection, registry: &TemplateRegistry) -> Result<CriticalPath> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, priority, issue_type, parent_id, assignee, \
         created_at, updated_at, closed_at, description, notes, fields FROM issues",
    )?;
    let rows = stmt.query_map([], crate::sqlite::issues::scan_issue)?;
    let mut nodes: HashMap<String, Issue> = HashMap::new();
    for row in rows {
        let issue = row?;
        if category_of(registry, &issue) != Category::Done {
            nodes.insert(issue.id.clone(), issue);
        }
    }

    // Edges restricted to the non-done subgraph: issue_id depends_on depends_on_id.
    let mut forward_edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut in_degree: HashMap<String, usize> = nodes.keys().map(|id| (id.clone(), 0)).collect();
    {
        let mut stmt = conn.prepare("SELECT issue_id, depends_on_id FROM dependencies")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (issue_id, depends_on_id) = row?;
            if nodes.contains_key(&issue_id) && nodes.contains_key(&depends_on_id) {
                // A chain edge runs depends_on_id -> issue_id (blocker precedes blockee).
                forward_edges.entry(depends_on_id.clone()).or_default().push(issue_id.clone());
                *in_degree.entry(issue_id).or_insert(0) += 1;
            }
        }
    }

    let mut queue: VecDeque<String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut topo_order = Vec::new();
    let mut remaining_in_degree = in_degree.clone();
    while let Some(node) = queue.pop_front() {
        topo_order.push(node.clone());
        if let Some(children) = forward_edges.get(&node) {
            for child in children {
                let degree = remaining_in_degree.entry(child.clone()).or_insert(0);
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(child.clone());
                }
            }
        }
    }

    // longest-path relaxation: dist[v] = length of longest chain ending at v,
    // prio_sum[v] = summed priority of that chain (the node's own priority
    // for an unextended chain). Ties in dist are broken in favor of the
    // lower prio_sum, independent of HashMap/topo-order iteration order, so
    // the result is deterministic across runs of the same graph.
    let mut dist: HashMap<String, usize> = nodes.keys().map(|id| (id.clone(), 1)).collect();
    let mut prio_sum: HashMap<String, i64> = nodes.iter().map(|(id, issue)| (id.clone(), issue.priority as i64)).collect();
    let mut predecessor: HashMap<String, String> = HashMap::new();
    for node in &topo_order {
        if let Some(children) = forward_edges.get(node) {
            let node_dist = *dist.get(node).unwrap_or(&1);
            let node_prio_sum = *prio_sum.get(node).unwrap_or(&0);
            for child in children {
                let child_priority = nodes.get(child).map(|i| i.priority as i64).unwrap_or(0);
                let candidate_dist = node_dist + 1;
                let candidate_prio_sum = node_prio_sum + child_priority;
                let current_dist = *dist.get(child).unwrap_or(&1);
                let current_prio_sum = *prio_sum.get(child).unwrap_or(&0);

                let better = candidate_dist > current_dist
                    || (candidate_dist == current_dist && candidate_prio_sum < current_prio_sum);
                if better {
                    dist.insert(child.clone(), candidate_dist);
                    prio_sum.insert(child.clone(), candidate_prio_sum);
                    predecessor.insert(child.clone(), node.clone());
                }
            }
        }
    }

    let Some(&best_len) = dist.values().max() else {
        return Ok(CriticalPath::default());
    };

    // Among all chains of the max length, pick the one with the lowest
    // summed priority; break any remaining tie by lowest issue id so the
    // result never depends on HashMap iteration order.
    let best_end = dist
        .iter()
        .filter(|(_, &len)| len == best_len)
        .min_by_key(|(id, _)| (prio_sum.get(*id).copied().unwrap_or(0), (*id).clone()))
        .map(|(id, _)| id.clone());

    let Some(best_end) = best_end else {
        return Ok(CriticalPath::default());
    };

    let mut chain = vec![best_end.clone()];
    let mut cursor = best_end;
    while let Some(prev) = predecessor.get(&cursor) {
        chain.push(prev.clone());
        cursor = prev.clone();
    }
    chain.reverse();

    Ok(CriticalPath { issue_ids: chain, length: best_len })
}

impl SqliteStore {
    pub fn add_dependency_impl(&self, issue_id: &str, depends_on_id: &str, actor: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            add_dependency_on_conn(&conn, issue_id, depends_on_id, actor)
        })
    }

    pub fn remove_dependency_impl(&self, issue_id: &str, depends_on_id: &str, actor: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            remove_dependency_on_conn(&conn, issue_id, depends_on_id, actor)
        })
    }

    pub fn get_ready_impl(
        &self,
        registry: &TemplateRegistry,
        type_filter: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Issue>> {
        let conn = self.lock_conn()?;
        get_ready_on_conn(&conn, registry, type_filter, limit)
    }

    pub fn get_blocked_impl(&self, registry: &TemplateRegistry) -> Result<Vec<BlockedIssue>> {
        let conn = self.lock_conn()?;
        get_blocked_on_conn(&conn, registry)
    }

    pub fn get_critical_path_impl(&self, registry: &TemplateRegistry) -> Result<CriticalPath> {
        let conn = self.lock_conn()?;
        get_critical_path_on_conn(&conn, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::issues::{create_issue_on_conn, CreateIssueParams};
    use std::path::Path;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap()
    }

    fn make_issue(conn: &Connection, reg: &TemplateRegistry, title: &str) -> Issue {
        create_issue_on_conn(
            conn,
            reg,
            "demo",
            CreateIssueParams { title: title.to_string(), ..Default::default() },
            "agent-1",
        )
        .unwrap()
    }

    #[test]
    fn self_dependency_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let a = make_issue(&conn, &reg, "A");
        let err = add_dependency_on_conn(&conn, &a.id, &a.id, "agent-1").unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn direct_cycle_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let a = make_issue(&conn, &reg, "A");
        let b = make_issue(&conn, &reg, "B");
        add_dependency_on_conn(&conn, &a.id, &b.id, "agent-1").unwrap();
        let err = add_dependency_on_conn(&conn, &b.id, &a.id, "agent-1").unwrap_err();
        assert!(matches!(err, StorageError::CycleDetected { .. }));
    }

    #[test]
    fn get_ready_excludes_blocked_issues() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let a = make_issue(&conn, &reg, "A");
        let b = make_issue(&conn, &reg, "B");
        add_dependency_on_conn(&conn, &a.id, &b.id, "agent-1").unwrap();

        let ready = get_ready_on_conn(&conn, &reg, None, None).unwrap();
        let ready_ids: Vec<&str> = ready.iter().map(|i| i.id.as_str()).collect();
        assert!(ready_ids.contains(&b.id.as_str()));
        assert!(!ready_ids.contains(&a.id.as_str()));
    }

    #[test]
    fn remove_dependency_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let a = make_issue(&conn, &reg, "A");
        let b = make_issue(&conn, &reg, "B");
        remove_dependency_on_conn(&conn, &a.id, &b.id, "agent-1").unwrap();
        remove_dependency_on_conn(&conn, &a.id, &b.id, "agent-1").unwrap();
    }
}
