//! `filigree dep|ready|blocked|critical-path` -- the dependency engine
//! (spec §4.2/C6).

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::{DepArgs, DepCommands, ReadyArgs};
use crate::context::RuntimeContext;
use crate::output::{format_issue_compact, output_json};

pub fn run(ctx: &RuntimeContext, args: &DepArgs) -> Result<()> {
    let store = ctx.open_store()?;
    match &args.command {
        DepCommands::Add { issue_id, depends_on_id } => {
            store
                .add_dependency_impl(issue_id, depends_on_id, &ctx.actor)
                .map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&serde_json::json!({ "added": true }));
            } else {
                println!("{issue_id} now depends on {depends_on_id}");
            }
        }
        DepCommands::Remove { issue_id, depends_on_id } => {
            store
                .remove_dependency_impl(issue_id, depends_on_id, &ctx.actor)
                .map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&serde_json::json!({ "removed": true }));
            } else {
                println!("{issue_id} no longer depends on {depends_on_id}");
            }
        }
    }
    Ok(())
}

pub fn run_ready(ctx: &RuntimeContext, args: &ReadyArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let issues = store
        .get_ready_impl(&registry, args.issue_type.as_deref(), args.limit)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issues);
    } else if issues.is_empty() {
        println!("No ready issues.");
    } else {
        for issue in &issues {
            println!("{}", format_issue_compact(issue));
        }
    }
    Ok(())
}

pub fn run_blocked(ctx: &RuntimeContext) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let blocked = store.get_blocked_impl(&registry).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&blocked);
    } else if blocked.is_empty() {
        println!("No blocked issues.");
    } else {
        for b in &blocked {
            println!("{}", format_issue_compact(&b.issue));
            for blocker in &b.blockers {
                println!("  blocked by: {}", format_issue_compact(blocker));
            }
        }
    }
    Ok(())
}

pub fn run_critical_path(ctx: &RuntimeContext) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let path = store.get_critical_path_impl(&registry).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&path);
    } else if path.issue_ids.is_empty() {
        println!("No critical path (graph is empty or fully closed).");
    } else {
        println!("Critical path (length {}): {}", path.length, path.issue_ids.join(" -> "));
    }
    Ok(())
}
