//! `filigree-mcpd` -- MCP tool-call boundary over the Filigree engine
//! (spec §6). Speaks JSON-RPC 2.0 over stdio; stdout carries only protocol
//! frames, so all logging goes to stderr.

mod protocol;
mod server;
mod state;
mod tools;

use std::path::PathBuf;

use clap::Parser;
use filigree_storage::SqliteStore;
use filigree_templates::TemplateRegistry;

use state::ServerState;

const DB_FILE_NAME: &str = "filigree.db";

#[derive(Parser, Debug)]
#[command(name = "filigree-mcpd", about = "MCP tool-call boundary for the Filigree issue tracker")]
struct Args {
    /// Project root containing `.filigree/`. Defaults to discovery upward
    /// from the current directory.
    #[arg(long)]
    project: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "filigree_mcpd=info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let project_root = match args.project {
        Some(p) => p,
        None => {
            let cwd = std::env::current_dir()?;
            filigree_config::find_project_root(&cwd)?
        }
    };

    let db_path = project_root.join(".filigree").join(DB_FILE_NAME);
    if !db_path.is_file() {
        anyhow::bail!("no database found at {} (run 'filigree init <prefix>' first)", db_path.display());
    }

    let store = SqliteStore::open(&db_path)?;
    let registry = TemplateRegistry::load(&project_root)?;
    let config = filigree_config::load_config(&project_root)?;

    let state = ServerState { store, registry, prefix: config.prefix, project_root };

    tracing::info!("filigree-mcpd ready, reading tool calls from stdin");
    server::run(state)?;
    Ok(())
}
