//! `filigree comment|label` -- per-issue discussion and tagging.

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::{CommentArgs, CommentCommands, LabelArgs, LabelCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run_comment(ctx: &RuntimeContext, args: &CommentArgs) -> Result<()> {
    let store = ctx.open_store()?;
    match &args.command {
        CommentCommands::Add { issue_id, text } => {
            let comment = store.add_comment_impl(issue_id, &ctx.actor, text).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&comment);
            } else {
                println!("added comment #{} to {issue_id}", comment.id);
            }
        }
        CommentCommands::List { issue_id } => {
            let comments = store.get_comments_impl(issue_id).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&comments);
            } else {
                for c in &comments {
                    println!("[{}] {}: {}", c.created_at.to_rfc3339(), c.author, c.text);
                }
            }
        }
    }
    Ok(())
}

pub fn run_label(ctx: &RuntimeContext, args: &LabelArgs) -> Result<()> {
    let store = ctx.open_store()?;
    match &args.command {
        LabelCommands::Add { issue_id, label } => {
            store.add_label_impl(issue_id, label, &ctx.actor).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&serde_json::json!({ "added": true }));
            } else {
                println!("added label {label:?} to {issue_id}");
            }
        }
        LabelCommands::Remove { issue_id, label } => {
            store.remove_label_impl(issue_id, label, &ctx.actor).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&serde_json::json!({ "removed": true }));
            } else {
                println!("removed label {label:?} from {issue_id}");
            }
        }
        LabelCommands::List { issue_id } => {
            let labels = store.get_labels_impl(issue_id).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&labels);
            } else {
                println!("{}", labels.join(", "));
            }
        }
    }
    Ok(())
}
