//! Comment CRUD (spec §3 "Comment"). Grounded in the teacher's
//! `beads-storage::sqlite::comments`.

use chrono::Utc;
use rusqlite::{Connection, params};

use filigree_core::events::EventType;
use filigree_core::issue::Comment;
use filigree_core::time::{format_datetime, parse_datetime};

use crate::error::Result;
use crate::sqlite::events::emit_event;
use crate::sqlite::store::SqliteStore;

pub(crate) fn add_comment_on_conn(
    conn: &Connection,
    issue_id: &str,
    author: &str,
    text: &str,
) -> Result<Comment> {
    let now = Utc::now();
    let now_str = format_datetime(&now);
    conn.execute(
        "INSERT INTO comments (issue_id, author, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![issue_id, author, text, now_str],
    )?;
    let id = conn.last_insert_rowid();
    emit_event(conn, issue_id, EventType::CommentAdded, author, None, None, Some(text))?;
    Ok(Comment {
        id,
        issue_id: issue_id.to_string(),
        author: author.to_string(),
        text: text.to_string(),
        created_at: now,
    })
}

pub(crate) fn get_comments_on_conn(conn: &Connection, issue_id: &str) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id, author, text, created_at FROM comments WHERE issue_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![issue_id], |row| {
        Ok(Comment {
            id: row.get(0)?,
            issue_id: row.get(1)?,
            author: row.get(2)?,
            text: row.get(3)?,
            created_at: parse_datetime(&row.get::<_, String>(4)?).unwrap_or_else(Utc::now),
        })
    })?;
    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

impl SqliteStore {
    pub fn add_comment_impl(&self, issue_id: &str, author: &str, text: &str) -> Result<Comment> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || add_comment_on_conn(&conn, issue_id, author, text))
    }

    pub fn get_comments_impl(&self, issue_id: &str) -> Result<Vec<Comment>> {
        let conn = self.lock_conn()?;
        get_comments_on_conn(&conn, issue_id)
    }
}
