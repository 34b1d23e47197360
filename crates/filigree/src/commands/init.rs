//! `filigree init` -- create a new `.filigree/` project directory.

use anyhow::{Context, Result};
use filigree_config::ProjectConfig;
use filigree_core::error::FiligreeError;
use filigree_storage::SqliteStore;

use crate::cli::InitArgs;
use crate::context::{DB_FILE_NAME, RuntimeContext};
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let project_root = match &ctx.project_override {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let config = ProjectConfig::new(args.prefix.clone());
    let filigree_dir = filigree_config::init_filigree_dir(&project_root, |tmp| {
        let json = serde_json::to_string_pretty(&config).map_err(std::io::Error::other)?;
        std::fs::write(tmp.join("config.json"), json)?;
        std::fs::create_dir_all(tmp.join("packs"))?;
        std::fs::create_dir_all(tmp.join("templates"))?;
        Ok(())
    })?;

    // `SqliteStore::open` runs schema initialization as a side effect.
    let db_path = filigree_dir.join(DB_FILE_NAME);
    let store = SqliteStore::open(&db_path).map_err(FiligreeError::from)?;
    store
        .set_config_impl("prefix", &args.prefix)
        .map_err(FiligreeError::from)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "project_root": project_root,
            "filigree_dir": filigree_dir,
            "prefix": args.prefix,
        }));
    } else {
        println!("Initialized filigree project at {}", filigree_dir.display());
    }
    Ok(())
}
