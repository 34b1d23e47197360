//! `filigree analytics` -- flow metrics over a trailing window (spec
//! §4.8/C10): cycle time, lead time, throughput.

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::AnalyticsArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &AnalyticsArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let registry = ctx.load_registry()?;
    let metrics = store
        .compute_flow_metrics_impl(&registry, args.window_days)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&metrics);
    } else {
        println!("window: {} days", metrics.window_days);
        match metrics.cycle_time_secs {
            Some(secs) => println!("cycle time: {:.1}h", secs / 3600.0),
            None => println!("cycle time: n/a"),
        }
        match metrics.lead_time_secs {
            Some(secs) => println!("lead time: {:.1}h", secs / 3600.0),
            None => println!("lead time: n/a"),
        }
        if metrics.throughput_per_day.is_empty() {
            println!("throughput: no closes in window");
        } else {
            println!("throughput:");
            for (day, count) in &metrics.throughput_per_day {
                println!("  {day}: {count}");
            }
        }
    }
    Ok(())
}
