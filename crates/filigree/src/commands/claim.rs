//! `filigree claim|claim-next|release` -- the atomic claim protocol
//! (spec §4.1).

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::{ClaimArgs, ClaimNextArgs, ReleaseArgs};
use crate::context::RuntimeContext;
use crate::output::{format_issue_compact, output_json};

pub fn run_claim(ctx: &RuntimeContext, args: &ClaimArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let issue = store
        .claim_issue_impl(&registry, &args.id, &args.assignee, &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issue);
    } else {
        println!("{}", format_issue_compact(&issue));
    }
    Ok(())
}

pub fn run_claim_next(ctx: &RuntimeContext, args: &ClaimNextArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let outcome = store
        .claim_next_impl(
            &registry,
            &args.assignee,
            args.issue_type.as_deref(),
            args.priority_min,
            args.priority_max,
            &ctx.actor,
        )
        .map_err(FiligreeError::from)?;

    match outcome {
        Some(outcome) => {
            if ctx.json {
                output_json(&serde_json::json!({ "issue": outcome.issue, "reason": outcome.reason }));
            } else {
                println!("{}", format_issue_compact(&outcome.issue));
                println!("  ({})", outcome.reason);
            }
        }
        None => {
            if ctx.json {
                output_json(&serde_json::json!({ "issue": null }));
            } else {
                println!("No ready issue matched the given filters.");
            }
        }
    }
    Ok(())
}

pub fn run_release(ctx: &RuntimeContext, args: &ReleaseArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let issue = store.release_claim_impl(&args.id, &ctx.actor).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&issue);
    } else {
        println!("{}", format_issue_compact(&issue));
    }
    Ok(())
}
