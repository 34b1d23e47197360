//! `filigree summary` -- force-regenerate `.filigree/context.md` (spec
//! §4.7/C9). Mutating commands call `refresh_summary` after every write;
//! this subcommand exists for explicit/manual regeneration and CI checks.

use anyhow::Result;

use crate::context::RuntimeContext;
use crate::output::output_json;

pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let root = ctx.project_root()?;
    let registry = ctx.load_registry()?;
    let store = ctx.open_store()?;

    store.refresh_summary(&registry, &root);
    let path = root.join(".filigree").join("context.md");

    if ctx.json {
        output_json(&serde_json::json!({ "path": path }));
    } else {
        println!("Regenerated {}", path.display());
    }
    Ok(())
}
