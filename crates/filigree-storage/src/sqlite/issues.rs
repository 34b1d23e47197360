//! The issue engine (spec §4.1/C5): create, update, close/reopen, claim
//! protocol, batch operations, and undo. Grounded in the teacher's
//! `beads-storage::sqlite::issues`, generalized from its bead-specific
//! status/type enums to the registry-driven template model.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use filigree_core::events::EventType;
use filigree_core::fields::FieldMap;
use filigree_core::idgen::{new_issue_id, new_issue_id_fallback};
use filigree_core::issue::Issue;
use filigree_core::time::{format_datetime, parse_datetime};
use filigree_templates::registry::TemplateRegistry;
use filigree_templates::transition::{TransitionOutcome, validate_transition};

use crate::error::{Result, StorageError};
use crate::sqlite::events::emit_event;
use crate::sqlite::store::SqliteStore;

const ISSUE_COLUMNS: &str = "id, title, status, priority, issue_type, parent_id, assignee, \
     created_at, updated_at, closed_at, description, notes, fields";

/// Same column list qualified with the `issues.` prefix, needed once a query
/// joins in `issues_fts` (whose `title`/`description`/`notes` columns would
/// otherwise be ambiguous).
const ISSUE_COLUMNS_QUALIFIED: &str =
    "issues.id, issues.title, issues.status, issues.priority, issues.issue_type, \
     issues.parent_id, issues.assignee, issues.created_at, issues.updated_at, \
     issues.closed_at, issues.description, issues.notes, issues.fields";

/// Turns free-text user input into an FTS5 MATCH query: each whitespace
/// token becomes its own quoted phrase ANDed together, so punctuation in the
/// input can't be parsed as FTS5 query syntax.
fn fts_match_query(text: &str) -> String {
    text.split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn scan_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<Issue> {
    let fields_json: String = row.get(12)?;
    let fields = FieldMap::from_stored(Some(&fields_json)).unwrap_or_default();
    let closed_at: Option<String> = row.get(9)?;
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row.get(2)?,
        priority: row.get(3)?,
        issue_type: row.get(4)?,
        parent_id: row.get(5)?,
        assignee: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(&row.get::<_, String>(8)?).unwrap_or_else(Utc::now),
        closed_at: closed_at.and_then(|s| parse_datetime(&s)),
        description: row.get(10)?,
        notes: row.get(11)?,
        fields,
    })
}

pub(crate) fn get_issue_on_conn(conn: &Connection, id: &str) -> Result<Issue> {
    conn.query_row(
        &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
        params![id],
        scan_issue,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("issue", id),
        other => StorageError::Query(other),
    })
}

pub(crate) fn get_issues_by_ids_on_conn(conn: &Connection, ids: &[String]) -> Result<Vec<Issue>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let bind: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let rows = stmt.query_map(bind.as_slice(), scan_issue)?;
    let mut issues = Vec::new();
    for row in rows {
        issues.push(row?);
    }
    Ok(issues)
}

/// Filter/sort/paginate parameters for `search_issues` (spec §4.1 implicit
/// list surface backing the CLI/HTTP/MCP boundaries).
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
    pub parent_id: Option<String>,
    /// Free-text search across `title`, `description`, and `notes`
    /// (spec §2/C2 "full-text index sync triggers" — see `issues_fts`
    /// in schema.rs). Grounded in the teacher's
    /// `beads-storage::sqlite::issues::search_issues_on_conn`, which
    /// joins the same three columns with `LIKE`.
    pub text_query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub(crate) fn search_issues_on_conn(conn: &Connection, query: &IssueQuery) -> Result<Vec<Issue>> {
    let has_text_query = query.text_query.as_deref().is_some_and(|t| !t.trim().is_empty());

    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    // The FTS MATCH param binds positionally where it appears in the FROM
    // clause, ahead of every WHERE-clause param, so it's pushed first.
    if has_text_query {
        bind.push(Box::new(fts_match_query(query.text_query.as_deref().unwrap())));
    }

    let mut clauses = Vec::new();
    if let Some(status) = &query.status {
        clauses.push("status = ?".to_string());
        bind.push(Box::new(status.clone()));
    }
    if let Some(issue_type) = &query.issue_type {
        clauses.push("issue_type = ?".to_string());
        bind.push(Box::new(issue_type.clone()));
    }
    if let Some(assignee) = &query.assignee {
        clauses.push("assignee = ?".to_string());
        bind.push(Box::new(assignee.clone()));
    }
    if let Some(parent_id) = &query.parent_id {
        clauses.push("parent_id = ?".to_string());
        bind.push(Box::new(parent_id.clone()));
    }

    let (from_clause, columns) = if has_text_query {
        (
            "issues JOIN issues_fts ON issues_fts.rowid = issues.rowid AND issues_fts MATCH ?",
            ISSUE_COLUMNS_QUALIFIED,
        )
    } else {
        ("issues", ISSUE_COLUMNS)
    };

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let limit = if query.limit > 0 { query.limit } else { 100 };
    let sql = format!(
        "SELECT {columns} FROM {from_clause} {where_clause} ORDER BY issues.priority ASC, issues.created_at ASC LIMIT ? OFFSET ?"
    );
    bind.push(Box::new(limit));
    bind.push(Box::new(query.offset));

    let mut stmt = conn.prepare(&sql)?;
    let bind_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(bind_refs.as_slice(), scan_issue)?;
    let mut issues = Vec::new();
    for row in rows {
        issues.push(row?);
    }
    Ok(issues)
}

/// Input to `create_issue` (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct CreateIssueParams {
    pub title: String,
    pub issue_type: Option<String>,
    pub priority: Option<i32>,
    pub parent_id: Option<String>,
    pub assignee: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub fields: Option<FieldMap>,
    pub status: Option<String>,
}

/// `create_issue` (spec §4.1). Mints a random id, validates the type
/// against the loaded registry, defaults `priority`/`status`, and records
/// a `created` event.
pub(crate) fn create_issue_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    prefix: &str,
    params: CreateIssueParams,
    actor: &str,
) -> Result<Issue> {
    let issue_type = params.issue_type.unwrap_or_else(|| "task".to_string());
    let snapshot = registry.current();
    let template = snapshot
        .get_template(&issue_type)
        .ok_or_else(|| StorageError::Validation(format!("unknown type: {issue_type:?}")))?;

    if let Some(parent_id) = &params.parent_id {
        if get_issue_on_conn(conn, parent_id).is_err() {
            return Err(StorageError::Validation(format!(
                "parent_id {parent_id:?} does not refer to an existing issue"
            )));
        }
    }

    let priority = params.priority.unwrap_or(2);
    let status = params.status.unwrap_or_else(|| template.initial_state.clone());
    let now = Utc::now();
    let now_str = format_datetime(&now);
    let fields = params.fields.unwrap_or_default();
    let assignee = params.assignee.unwrap_or_default();
    let description = params.description.unwrap_or_default();
    let notes = params.notes.unwrap_or_default();

    // INV-I2/P1: closed_at must be set iff the issue starts in a done-category
    // state (a custom template could name a done state as its initial one).
    let is_done = template.category_of(&status) == filigree_core::template::Category::Done;
    let closed_at = if is_done { Some(now_str.clone()) } else { None };

    let mut draft_builder = filigree_core::issue::IssueBuilder::new(params.title.as_str()).priority(priority);
    if is_done {
        draft_builder = draft_builder.closed_at(now);
    }
    let draft = draft_builder.build();
    filigree_core::validation::validate_issue(&draft, is_done).map_err(|e| StorageError::Validation(e.to_string()))?;

    let mut id = new_issue_id(prefix);
    for _ in 0..3 {
        let exists: bool = conn
            .query_row("SELECT 1 FROM issues WHERE id = ?1", params![id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            break;
        }
        id = new_issue_id_fallback(prefix);
    }

    conn.execute(
        "INSERT INTO issues
             (id, title, status, priority, issue_type, parent_id, assignee,
              created_at, updated_at, closed_at, description, notes, fields)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            params.title,
            status,
            priority,
            issue_type,
            params.parent_id,
            assignee,
            now_str,
            closed_at,
            description,
            notes,
            fields.to_stored(),
        ],
    )?;

    emit_event(conn, &id, EventType::Created, actor, None, Some(&status), None)?;

    get_issue_on_conn(conn, &id)
}

/// Input to `update_issue` (spec §4.1). Every field is `None` when left
/// unchanged; `Some` (even `Some(empty string)`) means "set this".
#[derive(Debug, Clone, Default)]
pub struct UpdateIssueParams {
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub title: Option<String>,
    pub assignee: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub fields: Option<FieldMap>,
    pub skip_transition_check: bool,
}

/// `update_issue` (spec §4.1): applies each changed field, records a
/// dedicated event per change, runs transition validation for status
/// changes, and maintains `closed_at` on category boundary crossing.
pub(crate) fn update_issue_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    id: &str,
    params: UpdateIssueParams,
    actor: &str,
) -> Result<(Issue, TransitionOutcome)> {
    let current = get_issue_on_conn(conn, id)?;
    let snapshot = registry.current();
    let template = snapshot.get_template(&current.issue_type);

    let mut outcome = TransitionOutcome::default();
    let mut sets: Vec<String> = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let new_status = params.status.clone().unwrap_or_else(|| current.status.clone());

    // INV-I2/I4: validate the prospective title/priority/closed_at-category
    // combination before applying any field or emitting any event.
    {
        let new_priority = params.priority.unwrap_or(current.priority);
        let new_title = params.title.clone().unwrap_or_else(|| current.title.clone());
        let category = template
            .map(|t| t.category_of(&new_status))
            .unwrap_or(filigree_core::template::Category::infer(&new_status));
        let is_done = category == filigree_core::template::Category::Done;
        let mut draft_builder = filigree_core::issue::IssueBuilder::new(new_title.as_str()).priority(new_priority);
        if is_done {
            draft_builder = draft_builder.closed_at(Utc::now());
        }
        let draft = draft_builder.build();
        filigree_core::validation::validate_issue(&draft, is_done).map_err(|e| StorageError::Validation(e.to_string()))?;
    }
    if let Some(new_status_value) = &params.status {
        if *new_status_value != current.status {
            // Build the prospective issue (pre-field mutation still reflects
            // the committed row; transition validation reads `fields` as it
            // will be after this update, so apply `fields` first if given).
            let mut prospective = current.clone();
            if let Some(fields) = &params.fields {
                prospective.fields = fields.clone();
            }
            outcome = validate_transition(
                template,
                &current.status,
                new_status_value,
                &prospective,
                params.skip_transition_check,
            )
            .map_err(storage_error_from_transition)?;

            sets.push("status = ?".to_string());
            bind.push(Box::new(new_status_value.clone()));
            emit_event(
                conn,
                id,
                EventType::StatusChanged,
                actor,
                Some(&current.status),
                Some(new_status_value),
                None,
            )?;

            let old_category = template
                .map(|t| t.category_of(&current.status))
                .unwrap_or(filigree_core::template::Category::infer(&current.status));
            let new_category = template
                .map(|t| t.category_of(new_status_value))
                .unwrap_or(filigree_core::template::Category::infer(new_status_value));
            use filigree_core::template::Category;
            if new_category == Category::Done && old_category != Category::Done {
                let now_str = format_datetime(&Utc::now());
                sets.push("closed_at = ?".to_string());
                bind.push(Box::new(now_str));
            } else if old_category == Category::Done && new_category != Category::Done {
                sets.push("closed_at = NULL".to_string());
            }
        }
    }

    if let Some(priority) = params.priority {
        if priority != current.priority {
            sets.push("priority = ?".to_string());
            bind.push(Box::new(priority));
            emit_event(
                conn,
                id,
                EventType::PriorityChanged,
                actor,
                Some(&current.priority.to_string()),
                Some(&priority.to_string()),
                None,
            )?;
        }
    }

    if let Some(title) = &params.title {
        if *title != current.title {
            sets.push("title = ?".to_string());
            bind.push(Box::new(title.clone()));
            emit_event(
                conn,
                id,
                EventType::TitleChanged,
                actor,
                Some(&current.title),
                Some(title),
                None,
            )?;
        }
    }

    if let Some(assignee) = &params.assignee {
        if *assignee != current.assignee {
            sets.push("assignee = ?".to_string());
            bind.push(Box::new(assignee.clone()));
            emit_event(
                conn,
                id,
                EventType::AssigneeChanged,
                actor,
                Some(&current.assignee),
                Some(assignee),
                None,
            )?;
        }
    }

    if let Some(description) = &params.description {
        if *description != current.description {
            sets.push("description = ?".to_string());
            bind.push(Box::new(description.clone()));
            emit_event(conn, id, EventType::DescriptionChanged, actor, None, None, None)?;
        }
    }

    if let Some(notes) = &params.notes {
        if *notes != current.notes {
            sets.push("notes = ?".to_string());
            bind.push(Box::new(notes.clone()));
            emit_event(conn, id, EventType::NotesChanged, actor, None, None, None)?;
        }
    }

    if let Some(parent_id) = &params.parent_id {
        if *parent_id != current.parent_id {
            if let Some(new_parent) = parent_id {
                if get_issue_on_conn(conn, new_parent).is_err() {
                    return Err(StorageError::Validation(format!(
                        "parent_id {new_parent:?} does not refer to an existing issue"
                    )));
                }
            }
            sets.push("parent_id = ?".to_string());
            bind.push(Box::new(parent_id.clone()));
            emit_event(
                conn,
                id,
                EventType::ParentChanged,
                actor,
                current.parent_id.as_deref(),
                parent_id.as_deref(),
                None,
            )?;
        }
    }

    if let Some(fields) = &params.fields {
        if *fields != current.fields {
            sets.push("fields = ?".to_string());
            bind.push(Box::new(fields.to_stored()));
            emit_event(conn, id, EventType::FieldsChanged, actor, None, None, None)?;
        }
    }

    if sets.is_empty() {
        return Ok((current, outcome));
    }

    sets.push("updated_at = ?".to_string());
    bind.push(Box::new(format_datetime(&Utc::now())));

    let sql = format!("UPDATE issues SET {} WHERE id = ?", sets.join(", "));
    bind.push(Box::new(id.to_string()));
    let bind_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
    conn.execute(&sql, bind_refs.as_slice())?;

    let _ = new_status;
    Ok((get_issue_on_conn(conn, id)?, outcome))
}

fn storage_error_from_transition(e: filigree_core::error::FiligreeError) -> StorageError {
    match e {
        filigree_core::error::FiligreeError::InvalidTransition {
            from,
            to,
            valid_transitions,
            missing_fields,
        } => StorageError::InvalidTransition {
            from,
            to,
            valid_transitions,
            missing_fields,
        },
        other => StorageError::Internal(other.to_string()),
    }
}

/// `close_issue` (spec §4.1): moves to the type's terminal `done` state via
/// `update_issue` with transition checks skipped, optionally appends a
/// reason comment, and returns the issues newly unblocked by this close.
pub(crate) fn close_issue_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    id: &str,
    reason: Option<&str>,
    actor: &str,
) -> Result<(Issue, Vec<Issue>)> {
    let current = get_issue_on_conn(conn, id)?;
    let snapshot = registry.current();
    let template = snapshot.get_template(&current.issue_type);
    let terminal = template
        .and_then(|t| t.terminal_state())
        .unwrap_or("closed")
        .to_string();

    let (closed, _) = update_issue_on_conn(
        conn,
        registry,
        id,
        UpdateIssueParams {
            status: Some(terminal),
            skip_transition_check: true,
            ..Default::default()
        },
        actor,
    )?;

    emit_event(conn, id, EventType::Closed, actor, None, None, reason)?;
    if let Some(reason_text) = reason {
        crate::sqlite::comments::add_comment_on_conn(conn, id, actor, reason_text)?;
    }

    let unblocked = newly_unblocked_by_close(conn, registry, id)?;
    Ok((closed, unblocked))
}

/// Issues whose only remaining open-category blocker was `closed_issue_id`.
fn newly_unblocked_by_close(conn: &Connection, registry: &TemplateRegistry, closed_issue_id: &str) -> Result<Vec<Issue>> {
    let mut stmt = conn.prepare(
        "SELECT issue_id FROM dependencies WHERE depends_on_id = ?1",
    )?;
    let dependents: Vec<String> = stmt
        .query_map(params![closed_issue_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<_, _>>()?;

    let mut unblocked = Vec::new();
    for dependent_id in dependents {
        if crate::sqlite::dependencies::has_outstanding_blocker_with_registry(conn, registry, &dependent_id)? {
            continue;
        }
        if let Ok(issue) = get_issue_on_conn(conn, &dependent_id) {
            unblocked.push(issue);
        }
    }
    Ok(unblocked)
}

/// `reopen_issue` (spec §4.1): fails unless the issue is in a `done`
/// category, then resets to the type's initial state.
pub(crate) fn reopen_issue_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    id: &str,
    actor: &str,
) -> Result<Issue> {
    let current = get_issue_on_conn(conn, id)?;
    let snapshot = registry.current();
    let template = snapshot.get_template(&current.issue_type);
    let category = template
        .map(|t| t.category_of(&current.status))
        .unwrap_or(filigree_core::template::Category::infer(&current.status));
    if category != filigree_core::template::Category::Done {
        return Err(StorageError::Validation(format!(
            "issue {id} is not in a done-category state"
        )));
    }
    let initial = template
        .map(|t| t.initial_state.clone())
        .unwrap_or_else(|| "open".to_string());

    let (reopened, _) = update_issue_on_conn(
        conn,
        registry,
        id,
        UpdateIssueParams {
            status: Some(initial),
            skip_transition_check: true,
            ..Default::default()
        },
        actor,
    )?;
    emit_event(conn, id, EventType::Reopened, actor, None, None, None)?;
    Ok(reopened)
}

/// `claim_issue` (spec §4.1, §5): a single conditional update keyed on both
/// status-category and current assignee.
pub(crate) fn claim_issue_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    id: &str,
    assignee: &str,
    actor: &str,
) -> Result<Issue> {
    let current = get_issue_on_conn(conn, id)?;
    let snapshot = registry.current();
    let category = snapshot
        .get_template(&current.issue_type)
        .map(|t| t.category_of(&current.status))
        .unwrap_or(filigree_core::template::Category::infer(&current.status));

    if category != filigree_core::template::Category::Open {
        return Err(StorageError::Validation(format!(
            "issue {id} is not in an open-category state"
        )));
    }
    if current.is_claimed() && current.assignee != assignee {
        return Err(StorageError::AlreadyClaimed {
            current_assignee: current.assignee,
        });
    }

    let affected = conn.execute(
        "UPDATE issues SET assignee = ?1, updated_at = ?2
         WHERE id = ?3 AND (assignee = '' OR assignee = ?1)",
        params![assignee, format_datetime(&Utc::now()), id],
    )?;
    if affected == 0 {
        let reread = get_issue_on_conn(conn, id)?;
        return Err(StorageError::AlreadyClaimed {
            current_assignee: reread.assignee,
        });
    }

    let old_assignee = if current.assignee.is_empty() {
        None
    } else {
        Some(current.assignee.as_str())
    };
    emit_event(conn, id, EventType::Claimed, actor, old_assignee, Some(assignee), None)?;
    get_issue_on_conn(conn, id)
}

/// `release_claim` (spec §4.1): clears `assignee`, rejecting if unset.
pub(crate) fn release_claim_on_conn(conn: &Connection, id: &str, actor: &str) -> Result<Issue> {
    let current = get_issue_on_conn(conn, id)?;
    if current.assignee.is_empty() {
        return Err(StorageError::Validation(format!("issue {id} has no assignee to release")));
    }
    conn.execute(
        "UPDATE issues SET assignee = '', updated_at = ?1 WHERE id = ?2",
        params![format_datetime(&Utc::now()), id],
    )?;
    emit_event(conn, id, EventType::Released, actor, Some(&current.assignee), None, None)?;
    get_issue_on_conn(conn, id)
}

/// `claim_next` outcome (spec §4.1: "returns the claimed issue plus a
/// human-readable selection reason").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClaimNextOutcome {
    pub issue: Issue,
    pub reason: String,
}

/// `claim_next` (spec §4.1): claims the highest-priority ready issue
/// matching the filters, atomically.
pub(crate) fn claim_next_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    assignee: &str,
    type_filter: Option<&str>,
    priority_min: Option<i32>,
    priority_max: Option<i32>,
    actor: &str,
) -> Result<Option<ClaimNextOutcome>> {
    let ready = crate::sqlite::dependencies::get_ready_on_conn(conn, registry, type_filter, None)?;
    let candidate = ready.into_iter().find(|issue| {
        priority_min.map(|min| issue.priority >= min).unwrap_or(true)
            && priority_max.map(|max| issue.priority <= max).unwrap_or(true)
    });

    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let claimed = claim_issue_on_conn(conn, registry, &candidate.id, assignee, actor)?;
    let reason = format!(
        "selected {} (priority {}, type {:?}, ready: no outstanding blockers)",
        claimed.id, claimed.priority, claimed.issue_type
    );
    Ok(Some(ClaimNextOutcome { issue: claimed, reason }))
}

/// A single failed item within a batch operation (spec §4.1: "partial
/// failure returns per-id error records").
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchItemError {
    pub id: String,
    pub error: String,
    pub code: &'static str,
    pub valid_transitions: Vec<String>,
}

/// Result of `batch_close`/`batch_update`: the successful subset and any
/// per-id failures. Callers commit the whole batch in one transaction; the
/// successful subset is what actually landed.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<Issue>,
    pub failed: Vec<BatchItemError>,
}

pub(crate) fn batch_close_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    ids: &[String],
    reason: Option<&str>,
    actor: &str,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for (idx, id) in ids.iter().enumerate() {
        let sp = format!("batch_close_{idx}");
        match crate::sqlite::txn::with_savepoint(conn, &sp, || {
            close_issue_on_conn(conn, registry, id, reason, actor)
        }) {
            Ok((issue, _)) => outcome.succeeded.push(issue),
            Err(e) => outcome.failed.push(batch_item_error(id, e)),
        }
    }
    Ok(outcome)
}

pub(crate) fn batch_update_on_conn(
    conn: &Connection,
    registry: &TemplateRegistry,
    ids: &[String],
    params_for: impl Fn() -> UpdateIssueParams,
    actor: &str,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for (idx, id) in ids.iter().enumerate() {
        let sp = format!("batch_update_{idx}");
        match crate::sqlite::txn::with_savepoint(conn, &sp, || {
            update_issue_on_conn(conn, registry, id, params_for(), actor)
        }) {
            Ok((issue, _)) => outcome.succeeded.push(issue),
            Err(e) => outcome.failed.push(batch_item_error(id, e)),
        }
    }
    Ok(outcome)
}

fn batch_item_error(id: &str, e: StorageError) -> BatchItemError {
    let valid_transitions = match &e {
        StorageError::InvalidTransition { valid_transitions, .. } => valid_transitions.clone(),
        _ => Vec::new(),
    };
    let code = FiligreeErrorCode::from(&e);
    BatchItemError {
        id: id.to_string(),
        error: e.to_string(),
        code: code.0,
        valid_transitions,
    }
}

struct FiligreeErrorCode(&'static str);

impl From<&StorageError> for FiligreeErrorCode {
    fn from(e: &StorageError) -> Self {
        FiligreeErrorCode(match e {
            StorageError::NotFound { .. } => "not_found",
            StorageError::Validation(_) => "validation_error",
            StorageError::InvalidTransition { .. } => "invalid_transition",
            StorageError::AlreadyClaimed { .. } => "already_claimed",
            StorageError::CycleDetected { .. } => "would_create_cycle",
            StorageError::InvalidPath(_) => "invalid_path",
            StorageError::Conflict(_) => "conflict",
            _ => "internal",
        })
    }
}

/// `undo_last` (spec §4.1): inverts the most recent reversible event for
/// the issue, without re-running transition validation.
pub(crate) fn undo_last_on_conn(conn: &Connection, issue_id: &str, actor: &str) -> Result<UndoOutcome> {
    let Some(event) = crate::sqlite::events::get_last_reversible_event_on_conn(conn, issue_id)?
    else {
        return Ok(UndoOutcome::NotUndone {
            reason: "no reversible event exists for this issue".to_string(),
        });
    };

    let old_value = event.old_value.clone();
    match event.event_type {
        EventType::StatusChanged => {
            let restored = old_value.ok_or_else(|| {
                StorageError::Internal("status_changed event missing old_value".into())
            })?;
            conn.execute(
                "UPDATE issues SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![restored, format_datetime(&Utc::now()), issue_id],
            )?;
        }
        EventType::PriorityChanged => {
            let restored: i32 = old_value
                .ok_or_else(|| StorageError::Internal("priority_changed missing old_value".into()))?
                .parse()
                .map_err(|_| StorageError::Internal("priority_changed old_value not an integer".into()))?;
            conn.execute(
                "UPDATE issues SET priority = ?1, updated_at = ?2 WHERE id = ?3",
                params![restored, format_datetime(&Utc::now()), issue_id],
            )?;
        }
        EventType::TitleChanged => {
            let restored = old_value
                .ok_or_else(|| StorageError::Internal("title_changed missing old_value".into()))?;
            conn.execute(
                "UPDATE issues SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![restored, format_datetime(&Utc::now()), issue_id],
            )?;
        }
        EventType::Claimed => {
            // Legacy pre-fix events may have no `old_value`; restore to empty.
            let restored = old_value.unwrap_or_default();
            conn.execute(
                "UPDATE issues SET assignee = ?1, updated_at = ?2 WHERE id = ?3",
                params![restored, format_datetime(&Utc::now()), issue_id],
            )?;
        }
        EventType::CommentAdded => {
            conn.execute(
                "DELETE FROM comments WHERE issue_id = ?1 AND id = (
                    SELECT id FROM comments WHERE issue_id = ?1 ORDER BY id DESC LIMIT 1
                )",
                params![issue_id],
            )?;
        }
        EventType::LabelAdded => {
            if let Some(label) = &event.new_value {
                conn.execute(
                    "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
                    params![issue_id, label],
                )?;
            }
        }
        _ => {
            return Ok(UndoOutcome::NotUndone {
                reason: format!("event type {} is not reversible", event.event_type),
            });
        }
    }

    let _ = actor;
    Ok(UndoOutcome::Undone {
        event_type: event.event_type.as_str().to_string(),
        event_id: event.id,
    })
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UndoOutcome {
    Undone { event_type: String, event_id: i64 },
    NotUndone { reason: String },
}

impl SqliteStore {
    pub fn get_issue_impl(&self, id: &str) -> Result<Issue> {
        let conn = self.lock_conn()?;
        get_issue_on_conn(&conn, id)
    }

    pub fn get_issues_by_ids_impl(&self, ids: &[String]) -> Result<Vec<Issue>> {
        let conn = self.lock_conn()?;
        get_issues_by_ids_on_conn(&conn, ids)
    }

    pub fn search_issues_impl(&self, query: &IssueQuery) -> Result<Vec<Issue>> {
        let conn = self.lock_conn()?;
        search_issues_on_conn(&conn, query)
    }

    pub fn create_issue_impl(
        &self,
        registry: &TemplateRegistry,
        prefix: &str,
        params: CreateIssueParams,
        actor: &str,
    ) -> Result<Issue> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            create_issue_on_conn(&conn, registry, prefix, params, actor)
        })
    }

    pub fn update_issue_impl(
        &self,
        registry: &TemplateRegistry,
        id: &str,
        params: UpdateIssueParams,
        actor: &str,
    ) -> Result<(Issue, TransitionOutcome)> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            update_issue_on_conn(&conn, registry, id, params, actor)
        })
    }

    pub fn close_issue_impl(
        &self,
        registry: &TemplateRegistry,
        id: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<(Issue, Vec<Issue>)> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            close_issue_on_conn(&conn, registry, id, reason, actor)
        })
    }

    pub fn reopen_issue_impl(&self, registry: &TemplateRegistry, id: &str, actor: &str) -> Result<Issue> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || reopen_issue_on_conn(&conn, registry, id, actor))
    }

    pub fn claim_issue_impl(
        &self,
        registry: &TemplateRegistry,
        id: &str,
        assignee: &str,
        actor: &str,
    ) -> Result<Issue> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            claim_issue_on_conn(&conn, registry, id, assignee, actor)
        })
    }

    pub fn release_claim_impl(&self, id: &str, actor: &str) -> Result<Issue> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || release_claim_on_conn(&conn, id, actor))
    }

    pub fn claim_next_impl(
        &self,
        registry: &TemplateRegistry,
        assignee: &str,
        type_filter: Option<&str>,
        priority_min: Option<i32>,
        priority_max: Option<i32>,
        actor: &str,
    ) -> Result<Option<ClaimNextOutcome>> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            claim_next_on_conn(&conn, registry, assignee, type_filter, priority_min, priority_max, actor)
        })
    }

    pub fn batch_close_impl(
        &self,
        registry: &TemplateRegistry,
        ids: &[String],
        reason: Option<&str>,
        actor: &str,
    ) -> Result<BatchOutcome> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            batch_close_on_conn(&conn, registry, ids, reason, actor)
        })
    }

    pub fn batch_update_impl(
        &self,
        registry: &TemplateRegistry,
        ids: &[String],
        params_for: impl Fn() -> UpdateIssueParams,
        actor: &str,
    ) -> Result<BatchOutcome> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            batch_update_on_conn(&conn, registry, ids, params_for, actor)
        })
    }

    pub fn undo_last_impl(&self, issue_id: &str, actor: &str) -> Result<UndoOutcome> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || undo_last_on_conn(&conn, issue_id, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::load(Path::new("/nonexistent-project-root-for-tests")).unwrap()
    }

    #[test]
    fn create_issue_defaults_type_priority_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams {
                title: "Write tests".to_string(),
                ..Default::default()
            },
            "agent-1",
        )
        .unwrap();
        assert_eq!(issue.issue_type, "task");
        assert_eq!(issue.priority, 2);
        assert!(issue.id.starts_with("demo-"));
        assert!(!issue.status.is_empty());
    }

    #[test]
    fn create_issue_rejects_unknown_type() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let err = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams {
                title: "x".to_string(),
                issue_type: Some("not-a-real-type".to_string()),
                ..Default::default()
            },
            "agent-1",
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn claim_then_reclaim_by_other_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "x".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();

        let claimed = claim_issue_on_conn(&conn, &reg, &issue.id, "bot-a", "bot-a").unwrap();
        assert_eq!(claimed.assignee, "bot-a");

        let err = claim_issue_on_conn(&conn, &reg, &issue.id, "bot-b", "bot-b").unwrap_err();
        assert!(matches!(err, StorageError::AlreadyClaimed { .. }));
    }

    #[test]
    fn close_then_reopen_roundtrips_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "x".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        let initial_status = issue.status.clone();

        let (closed, _unblocked) = close_issue_on_conn(&conn, &reg, &issue.id, Some("done"), "agent-1").unwrap();
        assert!(closed.closed_at.is_some());

        let reopened = reopen_issue_on_conn(&conn, &reg, &issue.id, "agent-1").unwrap();
        assert_eq!(reopened.status, initial_status);
        assert!(reopened.closed_at.is_none());
    }

    #[test]
    fn undo_last_restores_prior_title() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Original".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        update_issue_on_conn(
            &conn,
            &reg,
            &issue.id,
            UpdateIssueParams {
                title: Some("Changed".to_string()),
                ..Default::default()
            },
            "agent-1",
        )
        .unwrap();

        let outcome = undo_last_on_conn(&conn, &issue.id, "agent-1").unwrap();
        match outcome {
            UndoOutcome::Undone { event_type, .. } => assert_eq!(event_type, "title_changed"),
            other => panic!("expected Undone, got {other:?}"),
        }
        let restored = get_issue_on_conn(&conn, &issue.id).unwrap();
        assert_eq!(restored.title, "Original");
    }

    #[test]
    fn undo_last_reports_none_when_no_reversible_event() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "x".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();
        let outcome = undo_last_on_conn(&conn, &issue.id, "agent-1").unwrap();
        // `created` is not reversible, so immediately after creation there is
        // no reversible event yet.
        assert!(matches!(outcome, UndoOutcome::NotUndone { .. }));
    }

    #[test]
    fn text_query_matches_title_and_description_via_fts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams {
                title: "Fix login timeout".into(),
                description: "Sessions expire too early".into(),
                ..Default::default()
            },
            "agent-1",
        )
        .unwrap();
        create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams {
                title: "Polish the dashboard".into(),
                ..Default::default()
            },
            "agent-1",
        )
        .unwrap();

        let found = search_issues_on_conn(
            &conn,
            &IssueQuery { text_query: Some("timeout".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Fix login timeout");

        let none = search_issues_on_conn(
            &conn,
            &IssueQuery { text_query: Some("nonexistent-term".into()), ..Default::default() },
        )
        .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn text_query_combines_with_status_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let reg = registry();
        let issue = create_issue_on_conn(
            &conn,
            &reg,
            "demo",
            CreateIssueParams { title: "Investigate flaky timeout".into(), ..Default::default() },
            "agent-1",
        )
        .unwrap();

        let matching_status = issue.status.clone();
        let found = search_issues_on_conn(
            &conn,
            &IssueQuery {
                text_query: Some("flaky".into()),
                status: Some(matching_status),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);

        let found_wrong_status = search_issues_on_conn(
            &conn,
            &IssueQuery {
                text_query: Some("flaky".into()),
                status: Some("definitely-not-a-state".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(found_wrong_status.is_empty());
    }
}
