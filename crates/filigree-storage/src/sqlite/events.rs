//! The append-only event log (spec §3 "Event", §4.4, C4).
//!
//! `emit_event` is the single choke point every mutation goes through;
//! grounded in the teacher's `beads-storage::sqlite::issues::emit_event`
//! helper, lifted to its own module since it is now shared by issues,
//! labels, comments, dependencies, and the file/findings engine.

use chrono::Utc;
use rusqlite::{Connection, params};

use filigree_core::events::{Event, EventType};
use filigree_core::time::{format_datetime, parse_datetime};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

pub(crate) fn emit_event(
    conn: &Connection,
    issue_id: &str,
    event_type: EventType,
    actor: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    comment: Option<&str>,
) -> Result<i64> {
    let now_str = format_datetime(&Utc::now());
    conn.execute(
        "INSERT INTO events (issue_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            issue_id,
            event_type.as_str(),
            actor,
            old_value,
            new_value,
            comment,
            now_str
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn scan_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let event_type_str: String = row.get(2)?;
    let event_type = event_type_str.parse().unwrap_or(EventType::Created);
    Ok(Event {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        event_type,
        actor: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        comment: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?).unwrap_or_else(Utc::now),
    })
}

const EVENT_COLUMNS: &str =
    "id, issue_id, event_type, actor, old_value, new_value, comment, created_at";

pub(crate) fn get_issue_events_on_conn(
    conn: &Connection,
    issue_id: &str,
    limit: i64,
) -> Result<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE issue_id = ?1 ORDER BY id DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![issue_id, limit], scan_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub(crate) fn get_last_reversible_event_on_conn(
    conn: &Connection,
    issue_id: &str,
) -> Result<Option<Event>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE issue_id = ?1 ORDER BY id DESC"
    ))?;
    let mut rows = stmt.query(params![issue_id])?;
    while let Some(row) = rows.next()? {
        let event = scan_event(row)?;
        if event.event_type.is_reversible() {
            return Ok(Some(event));
        }
    }
    Ok(None)
}

pub(crate) fn get_events_since_on_conn(
    conn: &Connection,
    since_id: i64,
    limit: i64,
) -> Result<Vec<Event>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![since_id, limit], scan_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub(crate) fn get_recent_events_on_conn(conn: &Connection, limit: i64) -> Result<Vec<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], scan_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// `compact_events(keep_per_issue)`: truncates old events, keeping the N
/// newest per issue (spec §4.4).
pub(crate) fn compact_events_on_conn(conn: &Connection, keep_per_issue: i64) -> Result<usize> {
    let affected = conn.execute(
        "DELETE FROM events
         WHERE id NOT IN (
             SELECT id FROM (
                 SELECT id, ROW_NUMBER() OVER (
                     PARTITION BY issue_id ORDER BY id DESC
                 ) AS rn
                 FROM events
             ) WHERE rn <= ?1
         )",
        params![keep_per_issue],
    )?;
    Ok(affected)
}

/// `archive_closed(before)`: exports then removes issues closed before the
/// cutoff and all of their rows across every table (spec §4.4). Export is
/// the caller's responsibility (it reads the rows before this call); this
/// function only performs the removal.
pub(crate) fn archive_closed_on_conn(conn: &Connection, before: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM issues WHERE closed_at IS NOT NULL AND closed_at < ?1",
    )?;
    let ids: Vec<String> = stmt
        .query_map(params![before], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<_, _>>()?;

    for id in &ids {
        conn.execute("DELETE FROM comments WHERE issue_id = ?1", params![id])?;
        conn.execute("DELETE FROM labels WHERE issue_id = ?1", params![id])?;
        conn.execute("DELETE FROM events WHERE issue_id = ?1", params![id])?;
        conn.execute(
            "DELETE FROM dependencies WHERE issue_id = ?1 OR depends_on_id = ?1",
            params![id],
        )?;
        conn.execute(
            "DELETE FROM file_associations WHERE issue_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM issues WHERE id = ?1", params![id])?;
    }
    Ok(ids)
}

impl SqliteStore {
    pub fn get_issue_events_impl(&self, issue_id: &str, limit: i64) -> Result<Vec<Event>> {
        let conn = self.lock_conn()?;
        get_issue_events_on_conn(&conn, issue_id, limit)
    }

    pub fn get_events_since_impl(&self, since_id: i64, limit: i64) -> Result<Vec<Event>> {
        let conn = self.lock_conn()?;
        get_events_since_on_conn(&conn, since_id, limit)
    }

    pub fn get_recent_events_impl(&self, limit: i64) -> Result<Vec<Event>> {
        let conn = self.lock_conn()?;
        get_recent_events_on_conn(&conn, limit)
    }

    pub fn compact_events_impl(&self, keep_per_issue: i64) -> Result<usize> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || compact_events_on_conn(&conn, keep_per_issue))
    }

    pub fn archive_closed_impl(&self, before: &str) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || archive_closed_on_conn(&conn, before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::store::SqliteStore;

    #[test]
    fn emit_and_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        conn.execute(
            "INSERT INTO issues (id, title, status, priority, issue_type, created_at, updated_at)
             VALUES ('demo-1', 't', 'open', 2, 'task', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
            [],
        )
        .unwrap();
        emit_event(&conn, "demo-1", EventType::Created, "agent-1", None, None, None).unwrap();
        emit_event(
            &conn,
            "demo-1",
            EventType::StatusChanged,
            "agent-1",
            Some("open"),
            Some("in_progress"),
            None,
        )
        .unwrap();

        let events = get_issue_events_on_conn(&conn, "demo-1", 10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::StatusChanged);

        let last = get_last_reversible_event_on_conn(&conn, "demo-1").unwrap().unwrap();
        assert_eq!(last.event_type, EventType::StatusChanged);
    }

    #[test]
    fn compact_events_keeps_newest_per_issue() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        conn.execute(
            "INSERT INTO issues (id, title, status, priority, issue_type, created_at, updated_at)
             VALUES ('demo-1', 't', 'open', 2, 'task', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
            [],
        )
        .unwrap();
        for _ in 0..5 {
            emit_event(&conn, "demo-1", EventType::CommentAdded, "agent-1", None, None, None).unwrap();
        }
        let affected = compact_events_on_conn(&conn, 2).unwrap();
        assert_eq!(affected, 3);
        let remaining = get_issue_events_on_conn(&conn, "demo-1", 10).unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
