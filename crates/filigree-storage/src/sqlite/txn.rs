//! Transaction and savepoint helpers (spec §5: "all mutations funnel
//! through engine methods that wrap their work in transactions").
//!
//! Every `*_on_conn` helper elsewhere in this module takes a shared
//! `&Connection` rather than `&mut Connection`, so these helpers drive
//! `BEGIN`/`SAVEPOINT` by raw SQL (via `execute_batch`, which only needs
//! `&Connection`) instead of `rusqlite::Transaction`, which would force a
//! signature change across every engine method.

use rusqlite::Connection;

use crate::error::Result;

/// Runs `f` inside a `BEGIN IMMEDIATE`/`COMMIT` transaction, rolling back
/// on any error `f` returns. `BEGIN IMMEDIATE` (rather than a deferred
/// `BEGIN`) takes the write lock up front, matching the single-writer
/// model of spec §5 rather than discovering a write conflict mid-statement.
pub(crate) fn with_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    match f() {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Runs `f` inside a named `SAVEPOINT`, releasing it on success or rolling
/// back to it on error, for use inside an outer transaction established by
/// [`with_transaction`] (spec §4.1: batch operations commit the
/// successful subset atomically while discarding failed items individually).
pub(crate) fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    fn scratch_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn
    }

    #[test]
    fn transaction_commits_on_success() {
        let conn = scratch_conn();
        with_transaction(&conn, || {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();
        let count: i64 = conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let conn = scratch_conn();
        let result: Result<()> = with_transaction(&conn, || {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(StorageError::Validation("boom".into()))
        });
        assert!(result.is_err());
        let count: i64 = conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn savepoint_rolls_back_one_item_without_aborting_outer_transaction() {
        let conn = scratch_conn();
        with_transaction(&conn, || {
            conn.execute("INSERT INTO t (v) VALUES (1)", [])?;

            let failed: Result<()> = with_savepoint(&conn, "sp1", || {
                conn.execute("INSERT INTO t (v) VALUES (2)", [])?;
                Err(StorageError::Validation("boom".into()))
            });
            assert!(failed.is_err());

            conn.execute("INSERT INTO t (v) VALUES (3)", [])?;
            Ok(())
        })
        .unwrap();

        let values: Vec<i64> = {
            let mut stmt = conn.prepare("SELECT v FROM t ORDER BY v").unwrap();
            stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect()
        };
        assert_eq!(values, vec![1, 3]);
    }
}
