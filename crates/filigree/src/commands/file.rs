//! `filigree file` -- the file and scan-findings engine (spec §4.6/C8).

use std::io::Read as _;
use std::str::FromStr;

use anyhow::{Context, Result};
use filigree_core::error::FiligreeError;
use filigree_core::files::{AssocType, Severity};
use filigree_storage::{FileListQuery, IncomingFinding, RegisterFileParams};

use crate::cli::{FileArgs, FileCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &FileArgs) -> Result<()> {
    match &args.command {
        FileCommands::Register { path, language, file_type } => run_register(ctx, path, language, file_type),
        FileCommands::Show { id } => run_show(ctx, id),
        FileCommands::Scan { scan_source, findings, scan_run_id } => {
            run_scan(ctx, scan_source, findings, scan_run_id.as_deref())
        }
        FileCommands::Clean { scan_source, scan_run_id } => run_clean(ctx, scan_source, scan_run_id),
        FileCommands::Associate { file_id, issue_id, assoc_type } => {
            run_associate(ctx, file_id, issue_id, assoc_type)
        }
        FileCommands::List {
            language,
            path_prefix,
            min_findings,
            has_severity,
            scan_source,
            limit,
            offset,
        } => run_list(ctx, language, path_prefix, *min_findings, has_severity, scan_source, *limit, *offset),
        FileCommands::Timeline { file_id, event_type, limit, offset } => {
            run_timeline(ctx, file_id, event_type.as_deref(), *limit, *offset)
        }
        FileCommands::Hotspots { limit } => run_hotspots(ctx, *limit),
    }
}

fn run_register(ctx: &RuntimeContext, path: &str, language: &Option<String>, file_type: &Option<String>) -> Result<()> {
    let store = ctx.open_store()?;
    let prefix = ctx.prefix()?;
    let params = RegisterFileParams {
        path: path.to_string(),
        language: language.clone(),
        file_type: file_type.clone(),
        metadata: None,
    };
    let file = store.register_file_impl(&prefix, params).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&file);
    } else {
        println!("{} ({})", file.id, file.path);
    }
    Ok(())
}

fn run_show(ctx: &RuntimeContext, id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let file = store.get_file_impl(id).map_err(FiligreeError::from)?;
    output_json(&file);
    Ok(())
}

fn run_scan(ctx: &RuntimeContext, scan_source: &str, findings_path: &str, scan_run_id: Option<&str>) -> Result<()> {
    let raw = if findings_path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read findings from stdin")?;
        buf
    } else {
        std::fs::read_to_string(findings_path).with_context(|| format!("failed to read findings file {findings_path:?}"))?
    };
    let findings: Vec<IncomingFinding> = serde_json::from_str(&raw).context("findings payload is not valid JSON")?;

    let store = ctx.open_store()?;
    let prefix = ctx.prefix()?;
    let results = store
        .process_scan_results_impl(&prefix, scan_source, scan_run_id, &findings)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&results);
    } else {
        println!("processed {} finding(s)", results.len());
    }
    Ok(())
}

fn run_clean(ctx: &RuntimeContext, scan_source: &str, scan_run_id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let fixed = store.clean_stale_findings_impl(scan_source, scan_run_id).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&fixed);
    } else {
        println!("marked {} finding(s) fixed", fixed.len());
    }
    Ok(())
}

fn run_associate(ctx: &RuntimeContext, file_id: &str, issue_id: &str, assoc_type: &str) -> Result<()> {
    let assoc_type = AssocType::from_str(assoc_type).map_err(FiligreeError::validation)?;
    let store = ctx.open_store()?;
    let association = store
        .add_file_association_impl(file_id, issue_id, assoc_type)
        .map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&association);
    } else {
        println!("linked {file_id} <-> {issue_id} ({})", assoc_type.as_str());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_list(
    ctx: &RuntimeContext,
    language: &Option<String>,
    path_prefix: &Option<String>,
    min_findings: Option<i64>,
    has_severity: &Option<String>,
    scan_source: &Option<String>,
    limit: i64,
    offset: i64,
) -> Result<()> {
    let has_severity = has_severity
        .as_deref()
        .map(Severity::from_str)
        .transpose()
        .map_err(FiligreeError::validation)?;

    let store = ctx.open_store()?;
    let query = FileListQuery {
        language: language.clone(),
        path_prefix: path_prefix.clone(),
        min_findings,
        has_severity,
        scan_source: scan_source.clone(),
        limit,
        offset,
    };
    let page = store.list_files_paginated_impl(&query).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&page);
    } else {
        for summary in &page.items {
            println!(
                "{} ({}) - {} active finding(s), {} association(s)",
                summary.file.id, summary.file.path, summary.active_findings_count, summary.associations_count
            );
        }
        println!("-- {} of {} total", page.items.len(), page.total);
    }
    Ok(())
}

fn run_timeline(ctx: &RuntimeContext, file_id: &str, event_type: Option<&str>, limit: i64, offset: i64) -> Result<()> {
    let store = ctx.open_store()?;
    let timeline = store.get_file_timeline_impl(file_id, event_type, limit, offset).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&timeline);
    } else {
        for entry in &timeline {
            println!("[{}] {}: {}", entry.created_at.to_rfc3339(), entry.kind, entry.description);
        }
    }
    Ok(())
}

fn run_hotspots(ctx: &RuntimeContext, limit: i64) -> Result<()> {
    let store = ctx.open_store()?;
    let hotspots = store.get_file_hotspots_impl(limit).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&hotspots);
    } else {
        for h in &hotspots {
            println!("{} (score {}) - {}", h.file.id, h.score, h.file.path);
        }
    }
    Ok(())
}
