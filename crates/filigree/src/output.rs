//! Output formatting for the `filigree` CLI: JSON and human-readable
//! rendering, plus the shared error envelope.

use std::io::{self, Write};

use filigree_core::issue::Issue;
use serde::Serialize;

/// Print a value as pretty-printed JSON to stdout.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{json}");
        }
        Err(e) => {
            eprintln!("error: failed to serialize JSON: {e}");
            std::process::exit(1);
        }
    }
}

/// The product's closed error envelope (spec §6/§7), printed to stderr on
/// failure regardless of `--json` so scripts can grep it reliably.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: String,
}

impl ErrorEnvelope {
    pub fn from_filigree_error(e: &filigree_core::error::FiligreeError) -> Self {
        Self {
            error: e.to_string(),
            code: e.code().to_string(),
        }
    }
}

/// Format an issue as a compact one-line string:
/// `[P{priority}] [{type}] {id}: {title} ({status})`.
pub fn format_issue_compact(issue: &Issue) -> String {
    let assignee_part = if issue.assignee.is_empty() {
        String::new()
    } else {
        format!(" @{}", issue.assignee)
    };
    format!(
        "[P{}] [{}] {}: {} ({}){}",
        issue.priority, issue.issue_type, issue.id, issue.title, issue.status, assignee_part
    )
}

/// Print a simple aligned table with headers and rows.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            let _ = write!(handle, "  ");
        }
        let _ = write!(handle, "{:<width$}", header, width = widths[i]);
    }
    let _ = writeln!(handle);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            let _ = write!(handle, "  ");
        }
        let _ = write!(handle, "{}", "-".repeat(*width));
    }
    let _ = writeln!(handle);
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                let _ = write!(handle, "  ");
            }
            if i < widths.len() {
                let _ = write!(handle, "{:<width$}", cell, width = widths[i]);
            } else {
                let _ = write!(handle, "{cell}");
            }
        }
        let _ = writeln!(handle);
    }
}
