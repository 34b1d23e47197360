//! `filigree-httpd` -- thin REST boundary adapter over the Filigree engine
//! (spec §6). No business logic lives here or in `routes/`: every handler
//! translates a wire request into an `impl SqliteStore` call and the result
//! back into JSON, mirroring the CLI's `RuntimeContext`/`commands::*` split.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use filigree_storage::SqliteStore;
use filigree_templates::TemplateRegistry;

use state::AppState;

const DB_FILE_NAME: &str = "filigree.db";

#[derive(Parser, Debug)]
#[command(name = "filigree-httpd", about = "HTTP boundary for the Filigree issue tracker")]
struct Args {
    /// Project root containing `.filigree/`. Defaults to discovery upward
    /// from the current directory.
    #[arg(long)]
    project: Option<PathBuf>,

    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Directory of static assets (e.g. a bundled web UI) to serve under
    /// `/static/`. Omit to run API-only.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "filigree_httpd=info,tower_http=info".to_string()),
        )
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
    let registry = Arc::new(TemplateRegistry::load(&project_root)?);
    let config = filigree_config::load_config(&project_root)?;

    let state = AppState {
        store,
        registry,
        project_root,
        prefix: config.prefix,
    };

    let mut router = routes::build_router(state);
    if let Some(dir) = args.static_dir {
        router = router.nest_service("/static", tower_http::services::ServeDir::new(dir));
    }

    tracing::info!(addr = %args.bind, "filigree-httpd listening");
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
