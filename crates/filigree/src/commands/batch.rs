//! `filigree batch close|update` -- multi-issue batch operations
//! (spec §4.1).

use anyhow::Result;
use filigree_core::error::FiligreeError;
use filigree_storage::UpdateIssueParams;

use crate::cli::{BatchArgs, BatchCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &BatchArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;

    let outcome = match &args.command {
        BatchCommands::Close { ids, reason } => store
            .batch_close_impl(&registry, ids, reason.as_deref(), &ctx.actor)
            .map_err(FiligreeError::from)?,
        BatchCommands::Update { ids, status, priority } => {
            let params = UpdateIssueParams {
                status: status.clone(),
                priority: *priority,
                ..Default::default()
            };
            store
                .batch_update_impl(&registry, ids, || params.clone(), &ctx.actor)
                .map_err(FiligreeError::from)?
        }
    };

    if ctx.json {
        output_json(&outcome);
    } else {
        println!("{} succeeded, {} failed", outcome.succeeded.len(), outcome.failed.len());
        for failure in &outcome.failed {
            println!("  {} failed ({}): {}", failure.id, failure.code, failure.error);
        }
    }
    Ok(())
}
