//! Label CRUD (spec §3 "Label"). Grounded in the teacher's
//! `beads-storage::sqlite::labels`.

use rusqlite::{Connection, params};

use filigree_core::events::EventType;
use filigree_core::issue::is_reserved_label;

use crate::error::{Result, StorageError};
use crate::sqlite::events::emit_event;
use crate::sqlite::store::SqliteStore;

pub(crate) fn add_label_on_conn(
    conn: &Connection,
    issue_id: &str,
    label: &str,
    actor: &str,
) -> Result<()> {
    if is_reserved_label(label) {
        return Err(StorageError::Validation(format!(
            "label {label:?} uses a reserved prefix"
        )));
    }
    conn.execute(
        "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
        params![issue_id, label],
    )?;
    emit_event(conn, issue_id, EventType::LabelAdded, actor, None, Some(label), None)?;
    Ok(())
}

pub(crate) fn remove_label_on_conn(
    conn: &Connection,
    issue_id: &str,
    label: &str,
    actor: &str,
) -> Result<()> {
    let affected = conn.execute(
        "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
        params![issue_id, label],
    )?;
    if affected == 0 {
        return Err(StorageError::not_found("label", format!("{issue_id}:{label}")));
    }
    emit_event(conn, issue_id, EventType::LabelRemoved, actor, Some(label), None, None)?;
    Ok(())
}

pub(crate) fn get_labels_on_conn(conn: &Connection, issue_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT label FROM labels WHERE issue_id = ?1 ORDER BY label")?;
    let rows = stmt.query_map(params![issue_id], |row| row.get::<_, String>(0))?;
    let mut labels = Vec::new();
    for row in rows {
        labels.push(row?);
    }
    Ok(labels)
}

impl SqliteStore {
    pub fn add_label_impl(&self, issue_id: &str, label: &str, actor: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || add_label_on_conn(&conn, issue_id, label, actor))
    }

    pub fn remove_label_impl(&self, issue_id: &str, label: &str, actor: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || remove_label_on_conn(&conn, issue_id, label, actor))
    }

    pub fn get_labels_impl(&self, issue_id: &str) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        get_labels_on_conn(&conn, issue_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_label_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let err = add_label_on_conn(&conn, "demo-1", "status:blocked", "agent").unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }
}
