//! `filigree` -- agent-native issue tracker CLI.
//!
//! Entry point: parses CLI arguments with clap, resolves the runtime
//! context, and dispatches to command handlers. No business logic lives
//! here or in `commands/` beyond envelope formatting (spec §6/C11).

mod cli;
mod commands;
mod context;
mod output;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use cli::{Cli, Commands};
use context::RuntimeContext;
use output::ErrorEnvelope;

static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() -> ExitCode {
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        std::process::exit(0);
    });

    let cli = Cli::parse();

    if cli.global.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("filigree=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let ctx = match RuntimeContext::from_global_args(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            let envelope = ErrorEnvelope {
                error: e.to_string(),
                code: "validation_error".to_string(),
            };
            eprintln!("{}", serde_json::to_string(&envelope).unwrap_or_else(|_| e.to_string()));
            return ExitCode::from(1);
        }
    };

    let mutates = matches!(
        &cli.command,
        Commands::Create(_)
            | Commands::Update(_)
            | Commands::Close(_)
            | Commands::Reopen(_)
            | Commands::Undo(_)
            | Commands::Claim(_)
            | Commands::ClaimNext(_)
            | Commands::Release(_)
            | Commands::Dep(_)
            | Commands::Plan(_)
            | Commands::Comment(_)
            | Commands::Label(_)
            | Commands::Batch(_)
            | Commands::File(_)
    );

    let result = match &cli.command {
        Commands::Init(args) => commands::init::run(&ctx, args),
        Commands::Create(args) => commands::issue::run_create(&ctx, args),
        Commands::Show(args) => commands::issue::run_show(&ctx, args),
        Commands::List(args) => commands::issue::run_list(&ctx, args),
        Commands::Update(args) => commands::issue::run_update(&ctx, args),
        Commands::Close(args) => commands::issue::run_close(&ctx, args),
        Commands::Reopen(args) => commands::issue::run_reopen(&ctx, args),
        Commands::Undo(args) => commands::issue::run_undo(&ctx, args),
        Commands::Claim(args) => commands::claim::run_claim(&ctx, args),
        Commands::ClaimNext(args) => commands::claim::run_claim_next(&ctx, args),
        Commands::Release(args) => commands::claim::run_release(&ctx, args),
        Commands::Dep(args) => commands::dep::run(&ctx, args),
        Commands::Ready(args) => commands::dep::run_ready(&ctx, args),
        Commands::Blocked => commands::dep::run_blocked(&ctx),
        Commands::CriticalPath => commands::dep::run_critical_path(&ctx),
        Commands::Plan(args) => commands::plan::run(&ctx, args),
        Commands::Comment(args) => commands::collab::run_comment(&ctx, args),
        Commands::Label(args) => commands::collab::run_label(&ctx, args),
        Commands::Batch(args) => commands::batch::run(&ctx, args),
        Commands::Events(args) => commands::events::run(&ctx, args),
        Commands::File(args) => commands::file::run(&ctx, args),
        Commands::Template(args) => commands::template::run(&ctx, args),
        Commands::Config(args) => commands::config_cmd::run(&ctx, args),
        Commands::Analytics(args) => commands::analytics::run(&ctx, args),
        Commands::Summary => commands::summary::run(&ctx),
        Commands::Doctor => commands::doctor::run(&ctx),
        Commands::Completion(args) => commands::completion::run(args),
    };

    if mutates && result.is_ok() {
        refresh_summary_best_effort(&ctx);
    }

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if let Some(fe) = e.downcast_ref::<filigree_core::error::FiligreeError>() {
                let envelope = ErrorEnvelope::from_filigree_error(fe);
                eprintln!("{}", serde_json::to_string(&envelope).unwrap_or_else(|_| fe.to_string()));
                ExitCode::from(fe.exit_code() as u8)
            } else {
                eprintln!("error: {e:#}");
                ExitCode::from(1)
            }
        }
    }
}

/// Regenerates `.filigree/context.md` after a successful mutation (spec
/// §4.7/C9: "idempotent regeneration ... after every mutation"). Best
/// effort: `refresh_summary` already logs and swallows its own errors, and
/// a failure to open the store/registry here must not turn a successful
/// mutation into a failed command.
fn refresh_summary_best_effort(ctx: &RuntimeContext) {
    let (Ok(root), Ok(registry), Ok(store)) = (ctx.project_root(), ctx.load_registry(), ctx.open_store()) else {
        return;
    };
    store.refresh_summary(&registry, &root);
}
