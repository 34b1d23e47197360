//! `filigree plan create|get` -- the planning engine (spec §4.5/C7).

use std::io::Read;

use anyhow::{Context, Result};
use filigree_core::error::FiligreeError;
use filigree_core::plan::PlanPayload;

use crate::cli::{PlanArgs, PlanCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &PlanArgs) -> Result<()> {
    match &args.command {
        PlanCommands::Create { payload } => run_create(ctx, payload),
        PlanCommands::Get { milestone_id } => run_get(ctx, milestone_id),
    }
}

fn run_create(ctx: &RuntimeContext, payload_path: &str) -> Result<()> {
    let raw = if payload_path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read plan payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(payload_path)
            .with_context(|| format!("failed to read plan payload file {payload_path:?}"))?
    };
    let payload: PlanPayload = serde_json::from_str(&raw).context("plan payload is not valid JSON")?;

    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let prefix = ctx.prefix()?;

    let plan = store
        .create_plan_impl(&registry, &prefix, &payload, &ctx.actor)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&plan);
    } else {
        println!("Created plan {} ({:.1}% complete)", plan.milestone_id, plan.progress_pct);
        for phase in &plan.phases {
            println!("  {} [{}]: {}/{} done, {} ready", phase.phase_id, phase.title, phase.completed, phase.total, phase.ready);
        }
    }
    Ok(())
}

fn run_get(ctx: &RuntimeContext, milestone_id: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let plan = store.get_plan_impl(&registry, milestone_id).map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&plan);
    } else {
        println!("Plan {} ({:.1}% complete)", plan.milestone_id, plan.progress_pct);
        for phase in &plan.phases {
            println!("  {} [{}]: {}/{} done, {} ready", phase.phase_id, phase.title, phase.completed, phase.total, phase.ready);
        }
    }
    Ok(())
}
