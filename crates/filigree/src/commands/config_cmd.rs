//! `filigree config` -- ambient key/value passthrough config (spec §12,
//! grounded in `filigree-storage::sqlite::config`), plus the resolved
//! `config.json` document.

use anyhow::Result;
use filigree_core::error::FiligreeError;

use crate::cli::{ConfigArgs, ConfigCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &ConfigArgs) -> Result<()> {
    match &args.command {
        ConfigCommands::Show => run_show(ctx),
        ConfigCommands::Get { key } => run_get(ctx, key),
        ConfigCommands::Set { key, value } => run_set(ctx, key, value),
    }
}

fn run_show(ctx: &RuntimeContext) -> Result<()> {
    let root = ctx.project_root()?;
    let config = filigree_config::load_config(&root)?;
    let store = ctx.open_store()?;
    let passthrough = store.get_all_config_impl().map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "project": config,
            "ambient": passthrough,
        }));
    } else {
        println!("prefix: {}", config.prefix);
        println!("version: {}", config.version);
        println!("mode: {:?}", config.mode);
        println!("enabled_packs: {:?}", config.enabled_packs);
        if !passthrough.is_empty() {
            println!("ambient config:");
            let mut keys: Vec<_> = passthrough.keys().collect();
            keys.sort();
            for k in keys {
                println!("  {k} = {}", passthrough[k]);
            }
        }
    }
    Ok(())
}

fn run_get(ctx: &RuntimeContext, key: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let value = store.get_config_impl(key).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{value}");
    }
    Ok(())
}

fn run_set(ctx: &RuntimeContext, key: &str, value: &str) -> Result<()> {
    let store = ctx.open_store()?;
    store.set_config_impl(key, value).map_err(FiligreeError::from)?;
    if ctx.json {
        output_json(&serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{key} = {value}");
    }
    Ok(())
}
