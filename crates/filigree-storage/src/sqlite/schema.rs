//! Relational schema and forward-only migrations (spec §4.2/C2).
//!
//! Schema version is tracked in the `metadata` table under the key
//! `schema_version`; individual migrations are tracked under
//! `migration:<name>`, exactly as the teacher's `beads-storage::sqlite`
//! does it. `init_schema` is version-gated: a fresh database gets the
//! current DDL directly, an existing one is walked forward through
//! `MIGRATIONS` in order.

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// The full schema, as created for a brand-new database.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS issues (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    status        TEXT NOT NULL,
    priority      INTEGER NOT NULL DEFAULT 2,
    issue_type    TEXT NOT NULL,
    parent_id     TEXT,
    assignee      TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    closed_at     TEXT,
    description   TEXT NOT NULL DEFAULT '',
    notes         TEXT NOT NULL DEFAULT '',
    fields        TEXT NOT NULL DEFAULT '{}',
    FOREIGN KEY (parent_id) REFERENCES issues(id)
);

CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
CREATE INDEX IF NOT EXISTS idx_issues_parent ON issues(parent_id);
CREATE INDEX IF NOT EXISTS idx_issues_type ON issues(issue_type);
CREATE INDEX IF NOT EXISTS idx_issues_assignee ON issues(assignee);

-- Full-text index over title/description/notes (spec §2/C2), kept in sync
-- with the `issues` table by the triggers below rather than by rebuilding
-- it on read. `content=''` makes this an external-content-free (contentless)
-- index: rowids mirror `issues.rowid` so a MATCH join is a plain rowid join.
CREATE VIRTUAL TABLE IF NOT EXISTS issues_fts USING fts5(
    title, description, notes,
    content=''
);

CREATE TRIGGER IF NOT EXISTS issues_fts_ai AFTER INSERT ON issues BEGIN
    INSERT INTO issues_fts(rowid, title, description, notes)
    VALUES (new.rowid, new.title, new.description, new.notes);
END;

CREATE TRIGGER IF NOT EXISTS issues_fts_ad AFTER DELETE ON issues BEGIN
    INSERT INTO issues_fts(issues_fts, rowid, title, description, notes)
    VALUES ('delete', old.rowid, old.title, old.description, old.notes);
END;

CREATE TRIGGER IF NOT EXISTS issues_fts_au AFTER UPDATE ON issues BEGIN
    INSERT INTO issues_fts(issues_fts, rowid, title, description, notes)
    VALUES ('delete', old.rowid, old.title, old.description, old.notes);
    INSERT INTO issues_fts(rowid, title, description, notes)
    VALUES (new.rowid, new.title, new.description, new.notes);
END;

CREATE TABLE IF NOT EXISTS dependencies (
    issue_id       TEXT NOT NULL,
    depends_on_id  TEXT NOT NULL,
    dep_type       TEXT NOT NULL DEFAULT 'blocks',
    PRIMARY KEY (issue_id, depends_on_id),
    FOREIGN KEY (issue_id) REFERENCES issues(id),
    FOREIGN KEY (depends_on_id) REFERENCES issues(id)
);

CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on ON dependencies(depends_on_id);

CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id    TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    actor       TEXT NOT NULL,
    old_value   TEXT,
    new_value   TEXT,
    comment     TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_issue ON events(issue_id);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);

CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id    TEXT NOT NULL,
    author      TEXT NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    FOREIGN KEY (issue_id) REFERENCES issues(id)
);

CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id);

CREATE TABLE IF NOT EXISTS labels (
    issue_id  TEXT NOT NULL,
    label     TEXT NOT NULL,
    PRIMARY KEY (issue_id, label),
    FOREIGN KEY (issue_id) REFERENCES issues(id)
);

CREATE TABLE IF NOT EXISTS files (
    id          TEXT PRIMARY KEY,
    path        TEXT NOT NULL UNIQUE,
    language    TEXT,
    file_type   TEXT,
    first_seen  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS findings (
    id                   TEXT PRIMARY KEY,
    file_id              TEXT NOT NULL,
    scan_source          TEXT NOT NULL,
    rule_id              TEXT NOT NULL,
    severity             TEXT NOT NULL,
    status               TEXT NOT NULL,
    message              TEXT NOT NULL,
    suggestion           TEXT,
    line_start           INTEGER,
    line_end             INTEGER,
    first_seen           TEXT NOT NULL,
    last_seen_at         TEXT NOT NULL,
    seen_count           INTEGER NOT NULL DEFAULT 1,
    metadata             TEXT NOT NULL DEFAULT '{}',
    last_scan_run_id     TEXT,
    unseen_since_run_id  TEXT,
    FOREIGN KEY (file_id) REFERENCES files(id),
    UNIQUE (file_id, scan_source, rule_id, line_start)
);

CREATE INDEX IF NOT EXISTS idx_findings_file ON findings(file_id);
CREATE INDEX IF NOT EXISTS idx_findings_status ON findings(status);

CREATE TABLE IF NOT EXISTS file_associations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id     TEXT NOT NULL,
    issue_id    TEXT NOT NULL,
    assoc_type  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    FOREIGN KEY (file_id) REFERENCES files(id),
    FOREIGN KEY (issue_id) REFERENCES issues(id),
    UNIQUE (file_id, issue_id, assoc_type)
);

CREATE TABLE IF NOT EXISTS file_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id     TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    FOREIGN KEY (file_id) REFERENCES files(id)
);

CREATE TABLE IF NOT EXISTS config (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metadata (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
"#;

/// Forward-only numbered migrations, applied in order to a database that
/// predates them. Each is applied inside its own transaction and recorded
/// under `migration:<name>` in the `metadata` table. Empty today: v1 is the
/// baseline every fresh project starts at.
pub const MIGRATIONS: &[(&str, &str)] = &[];

pub const DEFAULT_CONFIG: &[(&str, &str)] = &[("prefix", "demo"), ("mode", "ethereal")];
