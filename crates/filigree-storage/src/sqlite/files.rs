//! The file and findings engine (spec §4.6/C8): file record upsert,
//! scan-finding ingest with dedup, file-issue associations, the merged
//! file timeline, and hotspot ranking. Grounded in the teacher's
//! `beads-storage::sqlite::issues` upsert-and-diff idiom, generalized to a
//! table the teacher never had (the beads schema has no file/finding
//! concept of its own).

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};

use filigree_core::events::EventType;
use filigree_core::files::{AssocType, FileAssociation, FileRecord, Finding, FindingStatus, Severity};
use filigree_core::idgen::{new_file_id, new_file_id_fallback};
use filigree_core::time::{format_datetime, parse_datetime};

use crate::error::{Result, StorageError};
use crate::sqlite::events::emit_event;
use crate::sqlite::store::SqliteStore;

const FILE_COLUMNS: &str = "id, path, language, file_type, first_seen, updated_at, metadata";

fn scan_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let metadata_json: String = row.get(6)?;
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        file_type: row.get(3)?,
        first_seen: parse_datetime(&row.get::<_, String>(4)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(&row.get::<_, String>(5)?).unwrap_or_else(Utc::now),
        metadata: parse_metadata(&metadata_json),
    })
}

fn parse_metadata(s: &str) -> Map<String, Value> {
    if s.trim().is_empty() {
        return Map::new();
    }
    serde_json::from_str(s).unwrap_or_default()
}

/// Normalizes a caller-supplied path to canonical project-relative form,
/// rejecting anything absolute or that escapes the project root (spec
/// §4.6: `invalid_path`).
pub fn normalize_project_path(path: &str) -> Result<String> {
    let path = path.replace('\\', "/");
    if path.is_empty() {
        return Err(StorageError::InvalidPath("path must not be empty".into()));
    }
    if path.starts_with('/') || path.contains(':') {
        return Err(StorageError::InvalidPath(format!(
            "path {path:?} must be project-relative, not absolute"
        )));
    }
    let mut normalized_segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(StorageError::InvalidPath(format!(
                    "path {path:?} escapes the project root"
                )));
            }
            other => normalized_segments.push(other),
        }
    }
    if normalized_segments.is_empty() {
        return Err(StorageError::InvalidPath("path must not be empty".into()));
    }
    Ok(normalized_segments.join("/"))
}

fn get_file_by_path_on_conn(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"),
        params![path],
        scan_file,
    )
    .optional()
    .map_err(StorageError::Query)
}

pub(crate) fn get_file_on_conn(conn: &Connection, id: &str) -> Result<FileRecord> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
        params![id],
        scan_file,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("file", id),
        other => StorageError::Query(other),
    })
}

/// Input to `register_file` (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct RegisterFileParams {
    pub path: String,
    pub language: Option<String>,
    pub file_type: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

/// `register_file` (spec §4.6): inserts if new, otherwise updates only the
/// fields whose value actually differs. Metadata comparison is by parsed
/// structure (key order irrelevant), not textual equality, so a
/// resubmission of equivalent JSON emits no spurious event (P/R1:
/// `register_file` called twice with identical inputs emits at most one
/// `file_metadata_update` event across both calls — here, zero, since
/// nothing changed on the second call).
pub(crate) fn register_file_on_conn(
    conn: &Connection,
    prefix: &str,
    params: RegisterFileParams,
) -> Result<FileRecord> {
    let path = normalize_project_path(&params.path)?;
    let now = Utc::now();
    let now_str = format_datetime(&now);
    let metadata = params.metadata.unwrap_or_default();

    match get_file_by_path_on_conn(conn, &path)? {
        None => {
            let mut id = new_file_id(prefix);
            for _ in 0..3 {
                let exists: bool = conn
                    .query_row("SELECT 1 FROM files WHERE id = ?1", params![id], |_| Ok(true))
                    .optional()?
                    .unwrap_or(false);
                if !exists {
                    break;
                }
                id = new_file_id_fallback(prefix);
            }
            conn.execute(
                "INSERT INTO files (id, path, language, file_type, first_seen, updated_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
                params![
                    id,
                    path,
                    params.language,
                    params.file_type,
                    now_str,
                    serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into()),
                ],
            )?;
            get_file_on_conn(conn, &id)
        }
        Some(existing) => {
            let mut sets = Vec::new();
            let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let mut changed_descriptions = Vec::new();

            if params.language != existing.language {
                sets.push("language = ?".to_string());
                bind.push(Box::new(params.language.clone()));
                changed_descriptions.push("language updated".to_string());
            }
            if params.file_type != existing.file_type {
                sets.push("file_type = ?".to_string());
                bind.push(Box::new(params.file_type.clone()));
                changed_descriptions.push("file_type updated".to_string());
            }
            if metadata != existing.metadata {
                sets.push("metadata = ?".to_string());
                bind.push(Box::new(serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into())));
                changed_descriptions.push("metadata updated".to_string());
            }

            if sets.is_empty() {
                return Ok(existing);
            }

            sets.push("updated_at = ?".to_string());
            bind.push(Box::new(now_str));

            let sql = format!("UPDATE files SET {} WHERE id = ?", sets.join(", "));
            bind.push(Box::new(existing.id.clone()));
            let bind_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();
            conn.execute(&sql, bind_refs.as_slice())?;

            record_file_event(conn, &existing.id, &changed_descriptions.join(", "))?;
            get_file_on_conn(conn, &existing.id)
        }
    }
}

fn record_file_event(conn: &Connection, file_id: &str, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO file_events (file_id, description, created_at) VALUES (?1, ?2, ?3)",
        params![file_id, description, format_datetime(&Utc::now())],
    )?;
    emit_event(conn, file_id, EventType::FileMetadataUpdate, "system", None, None, Some(description))?;
    Ok(())
}

/// One incoming finding from a scan run, before it is matched against any
/// existing row (spec §4.6 `process_scan_results`). `Deserialize` so the
/// CLI/HTTP/MCP boundary adapters can take a scan's findings as a JSON
/// array directly off the wire.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IncomingFinding {
    pub path: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub line_start: Option<i32>,
    pub line_end: Option<i32>,
    pub metadata: Option<Map<String, Value>>,
}

fn scan_finding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Finding> {
    let severity_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let metadata_json: String = row.get(12)?;
    Ok(Finding {
        id: row.get(0)?,
        file_id: row.get(1)?,
        scan_source: row.get(2)?,
        rule_id: row.get(3)?,
        severity: severity_str.parse().unwrap_or(Severity::Info),
        status: status_str.parse().unwrap_or(FindingStatus::Open),
        message: row.get(6)?,
        suggestion: row.get(7)?,
        line_start: row.get(8)?,
        line_end: row.get(9)?,
        first_seen: parse_datetime(&row.get::<_, String>(10)?).unwrap_or_else(Utc::now),
        last_seen_at: parse_datetime(&row.get::<_, String>(11)?).unwrap_or_else(Utc::now),
        seen_count: row.get(13)?,
        metadata: parse_metadata(&metadata_json),
        last_scan_run_id: row.get(14)?,
        unseen_since_run_id: row.get(15)?,
    })
}

const FINDING_COLUMNS: &str = "id, file_id, scan_source, rule_id, severity, status, message, \
    suggestion, line_start, line_end, first_seen, last_seen_at, metadata, seen_count, \
    last_scan_run_id, unseen_since_run_id";

/// `process_scan_results` (spec §4.6): dedup-upsert each incoming finding
/// by `(file_id, scan_source, rule_id, line_start)` (INV-F1). `scan_run_id`
/// is optional and only used to track `clean_stale_findings`'s grace
/// period (spec §13 resolution #1); omit it for one-off ingests.
pub(crate) fn process_scan_results_on_conn(
    conn: &Connection,
    prefix: &str,
    scan_source: &str,
    scan_run_id: Option<&str>,
    findings: &[IncomingFinding],
) -> Result<Vec<Finding>> {
    let mut results = Vec::new();
    for incoming in findings {
        let path = normalize_project_path(&incoming.path)?;
        let file = match get_file_by_path_on_conn(conn, &path)? {
            Some(f) => f,
            None => register_file_on_conn(
                conn,
                prefix,
                RegisterFileParams {
                    path: path.clone(),
                    ..Default::default()
                },
            )?,
        };

        let existing: Option<Finding> = conn
            .query_row(
                &format!(
                    "SELECT {FINDING_COLUMNS} FROM findings \
                     WHERE file_id = ?1 AND scan_source = ?2 AND rule_id = ?3 \
                     AND line_start IS ?4"
                ),
                params![file.id, scan_source, incoming.rule_id, incoming.line_start],
                scan_finding,
            )
            .optional()?;

        let now_str = format_datetime(&Utc::now());
        let metadata = incoming.metadata.clone().unwrap_or_default();
        let metadata_str = serde_json::to_string(&metadata).unwrap_or_else(|_| "{}".into());

        match existing {
            Some(existing) => {
                let reopen = matches!(
                    existing.status,
                    FindingStatus::Fixed | FindingStatus::UnseenInLatest
                );
                let new_status = if reopen { FindingStatus::Open } else { existing.status };
                conn.execute(
                    "UPDATE findings SET message = ?1, severity = ?2, line_end = ?3, suggestion = ?4, \
                     metadata = ?5, last_seen_at = ?6, seen_count = seen_count + 1, status = ?7, \
                     last_scan_run_id = ?8, unseen_since_run_id = NULL \
                     WHERE id = ?9",
                    params![
                        incoming.message,
                        incoming.severity.as_str(),
                        incoming.line_end,
                        incoming.suggestion,
                        metadata_str,
                        now_str,
                        new_status.as_str(),
                        scan_run_id,
                        existing.id,
                    ],
                )?;
                emit_event(
                    conn,
                    &existing.id,
                    EventType::FindingUpdated,
                    "system",
                    Some(existing.status.as_str()),
                    Some(new_status.as_str()),
                    None,
                )?;
                results.push(get_finding_on_conn(conn, &existing.id)?);
            }
            None => {
                let id = format!("{}-find-{}", prefix, filigree_core::idgen::sample_hex(10));
                conn.execute(
                    "INSERT INTO findings
                         (id, file_id, scan_source, rule_id, severity, status, message, suggestion,
                          line_start, line_end, first_seen, last_seen_at, seen_count, metadata,
                          last_scan_run_id, unseen_since_run_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?7, ?8, ?9, ?10, ?10, 1, ?11, ?12, NULL)",
                    params![
                        id,
                        file.id,
                        scan_source,
                        incoming.rule_id,
                        incoming.severity.as_str(),
                        incoming.message,
                        incoming.suggestion,
                        incoming.line_start,
                        incoming.line_end,
                        now_str,
                        metadata_str,
                        scan_run_id,
                    ],
                )?;
                emit_event(conn, &id, EventType::FindingCreated, "system", None, None, None)?;
                results.push(get_finding_on_conn(conn, &id)?);
            }
        }
    }
    Ok(results)
}

fn get_finding_on_conn(conn: &Connection, id: &str) -> Result<Finding> {
    conn.query_row(
        &format!("SELECT {FINDING_COLUMNS} FROM findings WHERE id = ?1"),
        params![id],
        scan_finding,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("finding", id),
        other => StorageError::Query(other),
    })
}

/// `clean_stale_findings(scan_source, scan_run_id)` (spec §4.6, §13
/// resolution #1): findings from `scan_source` not touched by
/// `scan_run_id` go `unseen_in_latest` on first absence, then `fixed` on a
/// second consecutive absence (i.e. they were already `unseen_in_latest`
/// from a prior run and are still absent now) — no wall-clock grace
/// period, driven entirely by caller-invoked scans.
pub(crate) fn clean_stale_findings_on_conn(
    conn: &Connection,
    scan_source: &str,
    scan_run_id: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id, status, unseen_since_run_id FROM findings \
         WHERE scan_source = ?1 AND (last_scan_run_id IS NULL OR last_scan_run_id != ?2) \
         AND status NOT IN ('fixed', 'false_positive')",
    )?;
    let rows: Vec<(String, String, Option<String>)> = stmt
        .query_map(params![scan_source, scan_run_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<_, _>>()?;

    let mut touched = Vec::new();
    for (id, status, unseen_since) in rows {
        if status == "unseen_in_latest" && unseen_since.is_some() {
            conn.execute(
                "UPDATE findings SET status = 'fixed' WHERE id = ?1",
                params![id],
            )?;
            emit_event(
                conn,
                &id,
                EventType::FindingUpdated,
                "system",
                Some("unseen_in_latest"),
                Some("fixed"),
                None,
            )?;
        } else {
            conn.execute(
                "UPDATE findings SET status = 'unseen_in_latest', unseen_since_run_id = ?2 WHERE id = ?1",
                params![id, scan_run_id],
            )?;
            emit_event(
                conn,
                &id,
                EventType::FindingUpdated,
                "system",
                Some(status.as_str()),
                Some("unseen_in_latest"),
                None,
            )?;
        }
        touched.push(id);
    }
    Ok(touched)
}

/// `add_file_association` (spec §4.6): insert-or-ignore on the full tuple,
/// closed-set `assoc_type`.
pub(crate) fn add_file_association_on_conn(
    conn: &Connection,
    file_id: &str,
    issue_id: &str,
    assoc_type: AssocType,
) -> Result<FileAssociation> {
    get_file_on_conn(conn, file_id)?;
    let now = Utc::now();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO file_associations (file_id, issue_id, assoc_type, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![file_id, issue_id, assoc_type.as_str(), format_datetime(&now)],
    )?;
    let row: (i64, String) = conn.query_row(
        "SELECT id, created_at FROM file_associations WHERE file_id = ?1 AND issue_id = ?2 AND assoc_type = ?3",
        params![file_id, issue_id, assoc_type.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    if affected > 0 {
        emit_event(conn, issue_id, EventType::AssociationCreated, "system", None, Some(file_id), None)?;
    }
    Ok(FileAssociation {
        id: row.0,
        file_id: file_id.to_string(),
        issue_id: issue_id.to_string(),
        assoc_type,
        created_at: parse_datetime(&row.1).unwrap_or(now),
    })
}

/// Filter/sort/paginate parameters for `list_files_paginated` (spec
/// §4.6).
#[derive(Debug, Clone, Default)]
pub struct FileListQuery {
    pub language: Option<String>,
    pub path_prefix: Option<String>,
    pub min_findings: Option<i64>,
    pub has_severity: Option<Severity>,
    pub scan_source: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Severity-count breakdown plus association count for one file, as
/// returned by `list_files_paginated` (spec §4.6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileSummary {
    pub file: FileRecord,
    pub severity_counts: HashMap<String, i64>,
    pub associations_count: i64,
    pub active_findings_count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedFiles {
    pub items: Vec<FileSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// `list_files_paginated` (spec §4.6). `min_findings` counts all
/// non-terminal statuses (P6), not only `open`.
pub(crate) fn list_files_paginated_on_conn(
    conn: &Connection,
    query: &FileListQuery,
) -> Result<PaginatedFiles> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files ORDER BY path"))?;
    let rows = stmt.query_map([], scan_file)?;
    let mut all_files = Vec::new();
    for row in rows {
        all_files.push(row?);
    }

    let mut summaries = Vec::new();
    for file in all_files {
        if let Some(language) = &query.language {
            if file.language.as_deref() != Some(language.as_str()) {
                continue;
            }
        }
        if let Some(prefix) = &query.path_prefix {
            if !file.path.starts_with(prefix.as_str()) {
                continue;
            }
        }

        let findings = findings_for_file(conn, &file.id, query.scan_source.as_deref())?;
        let active: Vec<&Finding> = findings.iter().filter(|f| !f.status.is_terminal()).collect();

        if let Some(min) = query.min_findings {
            if (active.len() as i64) < min {
                continue;
            }
        }
        if let Some(severity) = query.has_severity {
            if !active.iter().any(|f| f.severity == severity) {
                continue;
            }
        }

        let mut severity_counts: HashMap<String, i64> = HashMap::new();
        for f in &active {
            *severity_counts.entry(f.severity.as_str().to_string()).or_insert(0) += 1;
        }

        let associations_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file_associations WHERE file_id = ?1",
            params![file.id],
            |row| row.get(0),
        )?;

        summaries.push(FileSummary {
            active_findings_count: active.len() as i64,
            file,
            severity_counts,
            associations_count,
        });
    }

    let total = summaries.len() as i64;
    let limit = if query.limit > 0 { query.limit } else { 100 };
    let page = summaries
        .into_iter()
        .skip(query.offset.max(0) as usize)
        .take(limit as usize)
        .collect();

    Ok(PaginatedFiles {
        items: page,
        total,
        limit,
        offset: query.offset,
    })
}

fn findings_for_file(conn: &Connection, file_id: &str, scan_source: Option<&str>) -> Result<Vec<Finding>> {
    let sql = if scan_source.is_some() {
        format!("SELECT {FINDING_COLUMNS} FROM findings WHERE file_id = ?1 AND scan_source = ?2")
    } else {
        format!("SELECT {FINDING_COLUMNS} FROM findings WHERE file_id = ?1")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = if let Some(source) = scan_source {
        stmt.query_map(params![file_id, source], scan_finding)?
    } else {
        stmt.query_map(params![file_id], scan_finding)?
    };
    let mut findings = Vec::new();
    for row in rows {
        findings.push(row?);
    }
    Ok(findings)
}

/// One merged entry in `get_file_timeline` (spec §4.6: "Merges three
/// ordered streams -- finding events, association events, and
/// file-metadata events").
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileTimelineEntry {
    pub kind: &'static str,
    pub description: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// `get_file_timeline` (spec §4.6). Unknown `event_type` filter yields an
/// empty result, not an error.
pub(crate) fn get_file_timeline_on_conn(
    conn: &Connection,
    file_id: &str,
    event_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<FileTimelineEntry>> {
    if let Some(kind) = event_type {
        if !matches!(kind, "finding" | "association" | "file_metadata_update") {
            return Ok(Vec::new());
        }
    }

    let mut entries = Vec::new();

    if event_type.is_none() || event_type == Some("finding") {
        for finding in findings_for_file(conn, file_id, None)? {
            entries.push(FileTimelineEntry {
                kind: "finding",
                description: format!(
                    "{} finding {} ({}): {}",
                    finding.scan_source, finding.rule_id, finding.severity.as_str(), finding.message
                ),
                created_at: finding.last_seen_at,
            });
        }
    }

    if event_type.is_none() || event_type == Some("association") {
        let mut stmt = conn.prepare(
            "SELECT issue_id, assoc_type, created_at FROM file_associations WHERE file_id = ?1",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            let issue_id: String = row.get(0)?;
            let assoc_type: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((issue_id, assoc_type, created_at))
        })?;
        for row in rows {
            let (issue_id, assoc_type, created_at) = row?;
            entries.push(FileTimelineEntry {
                kind: "association",
                description: format!("{assoc_type} -> {issue_id}"),
                created_at: parse_datetime(&created_at).unwrap_or_else(Utc::now),
            });
        }
    }

    if event_type.is_none() || event_type == Some("file_metadata_update") {
        let mut stmt = conn.prepare(
            "SELECT description, created_at FROM file_events WHERE file_id = ?1",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
            let description: String = row.get(0)?;
            let created_at: String = row.get(1)?;
            Ok((description, created_at))
        })?;
        for row in rows {
            let (description, created_at) = row?;
            entries.push(FileTimelineEntry {
                kind: "file_metadata_update",
                description,
                created_at: parse_datetime(&created_at).unwrap_or_else(Utc::now),
            });
        }
    }

    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries.retain({
        let mut skipped = 0i64;
        move |_| {
            skipped += 1;
            skipped > offset
        }
    });
    entries.truncate(limit.max(0) as usize);
    Ok(entries)
}

/// One hotspot entry (spec §4.6 `get_file_hotspots`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileHotspot {
    pub file: FileRecord,
    pub score: u32,
}

/// `get_file_hotspots` (spec §4.6): ranks files by weighted active-finding
/// count (`critical×4 + high×3 + medium×2 + low`).
pub(crate) fn get_file_hotspots_on_conn(conn: &Connection, limit: i64) -> Result<Vec<FileHotspot>> {
    let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM files"))?;
    let rows = stmt.query_map([], scan_file)?;
    let mut scored = Vec::new();
    for row in rows {
        let file = row?;
        let findings = findings_for_file(conn, &file.id, None)?;
        let score: u32 = findings
            .iter()
            .filter(|f| !f.status.is_terminal())
            .map(|f| f.severity.hotspot_weight())
            .sum();
        if score > 0 {
            scored.push(FileHotspot { file, score });
        }
    }
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit.max(0) as usize);
    Ok(scored)
}

impl SqliteStore {
    pub fn register_file_impl(&self, prefix: &str, params: RegisterFileParams) -> Result<FileRecord> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || register_file_on_conn(&conn, prefix, params))
    }

    pub fn get_file_impl(&self, id: &str) -> Result<FileRecord> {
        let conn = self.lock_conn()?;
        get_file_on_conn(&conn, id)
    }

    pub fn process_scan_results_impl(
        &self,
        prefix: &str,
        scan_source: &str,
        scan_run_id: Option<&str>,
        findings: &[IncomingFinding],
    ) -> Result<Vec<Finding>> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            process_scan_results_on_conn(&conn, prefix, scan_source, scan_run_id, findings)
        })
    }

    pub fn clean_stale_findings_impl(&self, scan_source: &str, scan_run_id: &str) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            clean_stale_findings_on_conn(&conn, scan_source, scan_run_id)
        })
    }

    pub fn add_file_association_impl(
        &self,
        file_id: &str,
        issue_id: &str,
        assoc_type: AssocType,
    ) -> Result<FileAssociation> {
        let conn = self.lock_conn()?;
        crate::sqlite::txn::with_transaction(&conn, || {
            add_file_association_on_conn(&conn, file_id, issue_id, assoc_type)
        })
    }

    pub fn list_files_paginated_impl(&self, query: &FileListQuery) -> Result<PaginatedFiles> {
        let conn = self.lock_conn()?;
        list_files_paginated_on_conn(&conn, query)
    }

    pub fn get_file_timeline_impl(
        &self,
        file_id: &str,
        event_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileTimelineEntry>> {
        let conn = self.lock_conn()?;
        get_file_timeline_on_conn(&conn, file_id, event_type, limit, offset)
    }

    pub fn get_file_hotspots_impl(&self, limit: i64) -> Result<Vec<FileHotspot>> {
        let conn = self.lock_conn()?;
        get_file_hotspots_on_conn(&conn, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule_id: &str, severity: Severity, line_start: Option<i32>) -> IncomingFinding {
        IncomingFinding {
            path: "a.py".into(),
            rule_id: rule_id.into(),
            severity,
            message: "m".into(),
            suggestion: None,
            line_start,
            line_end: None,
            metadata: None,
        }
    }

    #[test]
    fn register_file_rejects_absolute_path() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let err = register_file_on_conn(
            &conn,
            "demo",
            RegisterFileParams { path: "/etc/passwd".into(), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[test]
    fn register_file_rejects_path_traversal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let err = register_file_on_conn(
            &conn,
            "demo",
            RegisterFileParams { path: "../outside.py".into(), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[test]
    fn register_file_same_metadata_emits_no_second_event() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let mut meta = Map::new();
        meta.insert("owner".into(), Value::String("team-a".into()));
        let params = RegisterFileParams {
            path: "src/a.py".into(),
            language: Some("python".into()),
            metadata: Some(meta.clone()),
            ..Default::default()
        };
        register_file_on_conn(&conn, "demo", params.clone()).unwrap();
        let file = register_file_on_conn(&conn, "demo", params).unwrap();
        let events = crate::sqlite::events::get_issue_events_on_conn(&conn, &file.id, 10).unwrap();
        assert_eq!(events.len(), 0);
    }

    #[test]
    fn process_scan_results_twice_doubles_seen_count() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let findings = vec![finding("E1", Severity::Low, None)];
        process_scan_results_on_conn(&conn, "demo", "ruff", None, &findings).unwrap();
        let results = process_scan_results_on_conn(&conn, "demo", "ruff", None, &findings).unwrap();
        assert_eq!(results[0].seen_count, 2);
    }

    #[test]
    fn min_findings_excludes_acknowledged_as_non_terminal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let findings = vec![finding("E1", Severity::Low, None)];
        let created = process_scan_results_on_conn(&conn, "demo", "ruff", None, &findings).unwrap();
        conn.execute(
            "UPDATE findings SET status = 'acknowledged' WHERE id = ?1",
            params![created[0].id],
        )
        .unwrap();

        let page = list_files_paginated_on_conn(
            &conn,
            &FileListQuery { min_findings: Some(1), limit: 10, ..Default::default() },
        )
        .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn clean_stale_findings_two_cycles_marks_fixed() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let findings = vec![finding("E1", Severity::Low, None)];
        process_scan_results_on_conn(&conn, "demo", "ruff", Some("run-1"), &findings).unwrap();
        let file_id = get_file_by_path_on_conn(&conn, "a.py").unwrap().unwrap().id;

        // First absence: goes unseen_in_latest, not fixed yet.
        clean_stale_findings_on_conn(&conn, "ruff", "run-2").unwrap();
        let after_first = findings_for_file(&conn, &file_id, None).unwrap();
        assert_eq!(after_first[0].status, FindingStatus::UnseenInLatest);

        // Second consecutive absence: now fixed.
        clean_stale_findings_on_conn(&conn, "ruff", "run-3").unwrap();
        let after_second = findings_for_file(&conn, &file_id, None).unwrap();
        assert_eq!(after_second[0].status, FindingStatus::Fixed);
    }

    #[test]
    fn association_insert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let file = register_file_on_conn(
            &conn,
            "demo",
            RegisterFileParams { path: "a.py".into(), ..Default::default() },
        )
        .unwrap();
        conn.execute(
            "INSERT INTO issues (id, title, status, priority, issue_type, created_at, updated_at)
             VALUES ('demo-1', 't', 'open', 2, 'task', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
            [],
        )
        .unwrap();
        add_file_association_on_conn(&conn, &file.id, "demo-1", AssocType::BugIn).unwrap();
        add_file_association_on_conn(&conn, &file.id, "demo-1", AssocType::BugIn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM file_associations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn hotspot_weighting_orders_by_severity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        process_scan_results_on_conn(
            &conn,
            "demo",
            "ruff",
            None,
            &[finding("E1", Severity::Critical, Some(1))],
        )
        .unwrap();
        let hotspots = get_file_hotspots_on_conn(&conn, 10).unwrap();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].score, 4);
    }
}
