//! `filigree events` -- the event log / change-feed (spec §4.4/C4).

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::{EventsArgs, EventsCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &EventsArgs) -> Result<()> {
    let store = ctx.open_store()?;

    match &args.command {
        EventsCommands::For { issue_id, limit } => {
            let events = store.get_issue_events_impl(issue_id, *limit).map_err(FiligreeError::from)?;
            print_events(ctx, &events);
        }
        EventsCommands::Recent { limit } => {
            let events = store.get_recent_events_impl(*limit).map_err(FiligreeError::from)?;
            print_events(ctx, &events);
        }
        EventsCommands::Since { since_id, limit } => {
            let events = store.get_events_since_impl(*since_id, *limit).map_err(FiligreeError::from)?;
            print_events(ctx, &events);
        }
        EventsCommands::Compact { keep_per_issue } => {
            let deleted = store.compact_events_impl(*keep_per_issue).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&serde_json::json!({ "deleted": deleted }));
            } else {
                println!("deleted {deleted} event(s)");
            }
        }
        EventsCommands::ArchiveClosed { before } => {
            let archived = store.archive_closed_impl(before).map_err(FiligreeError::from)?;
            if ctx.json {
                output_json(&archived);
            } else {
                println!("archived {} issue(s)", archived.len());
            }
        }
    }
    Ok(())
}

fn print_events(ctx: &RuntimeContext, events: &[filigree_core::events::Event]) {
    if ctx.json {
        output_json(events);
        return;
    }
    for e in events {
        let detail = match (&e.old_value, &e.new_value) {
            (Some(old), Some(new)) => format!("{old} -> {new}"),
            (None, Some(new)) => new.clone(),
            _ => String::new(),
        };
        println!("#{} [{}] {} {} by {}: {detail}", e.id, e.created_at.to_rfc3339(), e.issue_id, e.event_type, e.actor);
    }
}
