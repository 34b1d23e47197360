//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] resolves the project root, the actor name, and
//! (on demand) the storage handle and template registry a command needs.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use filigree_storage::SqliteStore;
use filigree_templates::TemplateRegistry;

use crate::cli::GlobalArgs;

pub const DB_FILE_NAME: &str = "filigree.db";

/// Runtime context passed to every command handler.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Explicit `--project` override, if given.
    pub project_override: Option<PathBuf>,
    pub actor: String,
    pub json: bool,
}

impl RuntimeContext {
    /// Resolves the runtime context and validates the resolved `actor`
    /// (spec §6 boundary rule, same check the HTTP and MCP adapters apply
    /// to their wire-level `actor` field).
    pub fn from_global_args(global: &GlobalArgs) -> Result<Self> {
        let actor = resolve_actor(global.actor.as_deref());
        filigree_core::validation::validate_actor(&actor).map_err(|e| anyhow::anyhow!("invalid actor: {e}"))?;
        Ok(Self {
            project_override: global.project.as_ref().map(PathBuf::from),
            actor,
            json: global.json,
        })
    }

    /// Resolves the project root: `--project` if given, otherwise
    /// discovery of `.filigree/` upward from the current directory.
    pub fn project_root(&self) -> Result<PathBuf> {
        if let Some(p) = &self.project_override {
            return Ok(p.clone());
        }
        let cwd = env::current_dir().context("failed to read current directory")?;
        filigree_config::find_project_root(&cwd)
            .context("no .filigree directory found (run 'filigree init <prefix>' first)")
    }

    /// Opens the project's database, failing with a clear message if the
    /// project hasn't been initialized.
    pub fn open_store(&self) -> Result<SqliteStore> {
        let root = self.project_root()?;
        let db_path = root.join(".filigree").join(DB_FILE_NAME);
        if !db_path.is_file() {
            bail!(
                "no database found at {} (run 'filigree init <prefix>' first)",
                db_path.display()
            );
        }
        Ok(SqliteStore::open(&db_path)?)
    }

    /// Loads the three-layer template registry for the project root.
    pub fn load_registry(&self) -> Result<TemplateRegistry> {
        let root = self.project_root()?;
        Ok(TemplateRegistry::load(&root)?)
    }

    /// Reads the project's issue id prefix from `config.json`.
    pub fn prefix(&self) -> Result<String> {
        let root = self.project_root()?;
        let config = filigree_config::load_config(&root)?;
        Ok(config.prefix)
    }
}

/// Resolves the actor name: explicit flag > `FILIGREE_ACTOR` env >
/// `git config user.name` > `$USER`/`$USERNAME` > `"unknown"`.
fn resolve_actor(flag_value: Option<&str>) -> String {
    if let Some(actor) = flag_value {
        if !actor.is_empty() {
            return actor.to_string();
        }
    }

    if let Ok(actor) = env::var("FILIGREE_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = Command::new("git").args(["config", "user.name"]).output() {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

/// Discovers `.filigree/` walking up from `base`, for callers that don't
/// need the full [`RuntimeContext`] (e.g. `filigree init`'s pre-check).
pub fn filigree_dir_exists(base: &Path) -> bool {
    base.join(".filigree").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_actor_with_flag() {
        assert_eq!(resolve_actor(Some("alice")), "alice");
    }

    #[test]
    fn resolve_actor_empty_flag_falls_through() {
        assert!(!resolve_actor(Some("")).is_empty());
    }

    #[test]
    fn resolve_actor_none_falls_through() {
        assert!(!resolve_actor(None).is_empty());
    }
}
