//! `filigree create|show|list|update|close|reopen|undo` -- issue CRUD and
//! lifecycle operations (spec §4.1/C5).

use anyhow::Result;
use filigree_core::error::FiligreeError;
use filigree_core::fields::FieldMap;
use filigree_storage::{CreateIssueParams, IssueQuery, UpdateIssueParams};

use crate::cli::{CloseArgs, CreateArgs, ListArgs, ReopenArgs, ShowArgs, UndoArgs, UpdateArgs};
use crate::context::RuntimeContext;
use crate::output::{format_issue_compact, output_json};

pub fn run_create(ctx: &RuntimeContext, args: &CreateArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let prefix = ctx.prefix()?;

    let mut fields = FieldMap::new();
    for (key, value) in &args.fields {
        fields.insert(key.clone(), value.clone());
    }

    let params = CreateIssueParams {
        title: args.title.clone(),
        issue_type: Some(args.issue_type.clone()),
        priority: args.priority,
        parent_id: args.parent.clone(),
        assignee: args.assignee.clone(),
        description: args.description.clone(),
        notes: args.notes.clone(),
        fields: if fields.is_empty() { None } else { Some(fields) },
        status: args.status.clone(),
    };

    let issue = store
        .create_issue_impl(&registry, &prefix, params, &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issue);
    } else {
        println!("{}", format_issue_compact(&issue));
    }
    Ok(())
}

pub fn run_show(ctx: &RuntimeContext, args: &ShowArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let issue = store.get_issue_impl(&args.id).map_err(FiligreeError::from)?;
    let labels = store.get_labels_impl(&args.id).map_err(FiligreeError::from)?;
    let comments = store.get_comments_impl(&args.id).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "issue": issue,
            "labels": labels,
            "comments": comments,
        }));
    } else {
        println!("{}", format_issue_compact(&issue));
        if !issue.description.is_empty() {
            println!("\n{}", issue.description);
        }
        if !labels.is_empty() {
            println!("\nLabels: {}", labels.join(", "));
        }
        if !comments.is_empty() {
            println!("\nComments:");
            for c in &comments {
                println!("  [{}] {}: {}", c.created_at.to_rfc3339(), c.author, c.text);
            }
        }
    }
    Ok(())
}

pub fn run_list(ctx: &RuntimeContext, args: &ListArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let query = IssueQuery {
        status: args.status.clone(),
        issue_type: args.issue_type.clone(),
        assignee: args.assignee.clone(),
        parent_id: args.parent.clone(),
        text_query: args.query.clone(),
        limit: args.limit,
        offset: args.offset,
    };
    let issues = store.search_issues_impl(&query).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issues);
    } else if issues.is_empty() {
        println!("No issues found.");
    } else {
        for issue in &issues {
            println!("{}", format_issue_compact(issue));
        }
    }
    Ok(())
}

pub fn run_update(ctx: &RuntimeContext, args: &UpdateArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;

    let mut fields = FieldMap::new();
    for (key, value) in &args.fields {
        fields.insert(key.clone(), value.clone());
    }

    let params = UpdateIssueParams {
        status: args.status.clone(),
        priority: args.priority,
        title: args.title.clone(),
        assignee: args.assignee.clone(),
        description: args.description.clone(),
        notes: args.notes.clone(),
        parent_id: args.parent.as_ref().map(|p| if p.is_empty() { None } else { Some(p.clone()) }),
        fields: if fields.is_empty() { None } else { Some(fields) },
        skip_transition_check: args.force,
    };

    let (issue, outcome) = store
        .update_issue_impl(&registry, &args.id, params, &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({ "issue": issue, "warnings": outcome.warnings }));
    } else {
        println!("{}", format_issue_compact(&issue));
        for warning in &outcome.warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

pub fn run_close(ctx: &RuntimeContext, args: &CloseArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let (issue, unblocked) = store
        .close_issue_impl(&registry, &args.id, args.reason.as_deref(), &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({ "issue": issue, "newly_unblocked": unblocked }));
    } else {
        println!("{}", format_issue_compact(&issue));
        for u in &unblocked {
            println!("  unblocked: {}", format_issue_compact(u));
        }
    }
    Ok(())
}

pub fn run_reopen(ctx: &RuntimeContext, args: &ReopenArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let issue = store
        .reopen_issue_impl(&registry, &args.id, &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issue);
    } else {
        println!("{}", format_issue_compact(&issue));
    }
    Ok(())
}

pub fn run_undo(ctx: &RuntimeContext, args: &UndoArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let outcome = store.undo_last_impl(&args.id, &ctx.actor).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&outcome_to_json(&outcome));
    } else {
        match &outcome {
            filigree_storage::UndoOutcome::Undone { event_type, event_id } => {
                println!("undone: {event_type} (event #{event_id})");
            }
            filigree_storage::UndoOutcome::NotUndone { reason } => {
                println!("nothing to undo: {reason}");
            }
        }
    }
    Ok(())
}

fn outcome_to_json(outcome: &filigree_storage::UndoOutcome) -> serde_json::Value {
    match outcome {
        filigree_storage::UndoOutcome::Undone { event_type, event_id } => serde_json::json!({
            "undone": true,
            "event_type": event_type,
            "event_id": event_id,
        }),
        filigree_storage::UndoOutcome::NotUndone { reason } => serde_json::json!({
            "undone": false,
            "reason": reason,
        }),
    }
}
