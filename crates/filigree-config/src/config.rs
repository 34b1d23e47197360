//! The project configuration document, `<project>/.filigree/config.json`
//! (spec §6). Loaded with `figment`'s layered-provider model: built-in
//! defaults, overridden by the file, overridden by environment variables —
//! the same shape as the teacher's YAML loader (spec §10.3), with `json`
//! swapped in for `yaml` since the product format is explicitly JSON.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Deployment mode (spec §6). `Ethereal` is the default: a project meant
/// to be thrown away and recreated freely. `Server` projects are expected
/// to run the HTTP/MCP daemons long-lived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Ethereal,
    Server,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Ethereal
    }
}

/// The project configuration document (spec §6: `{prefix, version, mode?,
/// enabled_packs}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub prefix: String,
    #[serde(default = "default_version")]
    pub version: i32,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_enabled_packs")]
    pub enabled_packs: Vec<String>,
}

fn default_version() -> i32 {
    1
}

fn default_enabled_packs() -> Vec<String> {
    vec!["core".to_string()]
}

impl ProjectConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: default_version(),
            mode: Mode::default(),
            enabled_packs: default_enabled_packs(),
        }
    }
}

/// Loads `<project_root>/.filigree/config.json`, layered over built-in
/// defaults and overridable by `FILIGREE_CONFIG_*` environment variables
/// (e.g. `FILIGREE_CONFIG_MODE=server`).
pub fn load_config(project_root: &Path) -> Result<ProjectConfig> {
    let config_path = project_root.join(".filigree").join("config.json");
    if !config_path.is_file() {
        return Err(ConfigError::FiligreeDirNotFound);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(serde_json::json!({
            "version": default_version(),
            "mode": "ethereal",
            "enabled_packs": default_enabled_packs(),
        })))
        .merge(Json::file(&config_path))
        .merge(Env::prefixed("FILIGREE_CONFIG_"));

    figment.extract().map_err(ConfigError::ParseError)
}

/// Writes `config` to `<project_root>/.filigree/config.json`. The
/// `.filigree/` directory must already exist (created by `filigree init`
/// via [`crate::project_dir::init_filigree_dir`]).
pub fn save_config(project_root: &Path, config: &ProjectConfig) -> Result<()> {
    let dir = project_root.join(".filigree");
    let config_path = dir.join("config.json");
    let json = serde_json::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue {
        key: "config".into(),
        reason: e.to_string(),
    })?;
    std::fs::write(config_path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::FiligreeDirNotFound));
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filigree")).unwrap();
        let config = ProjectConfig::new("demo");
        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filigree")).unwrap();
        std::fs::write(
            dir.path().join(".filigree").join("config.json"),
            r#"{"prefix": "acme"}"#,
        )
        .unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.prefix, "acme");
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.mode, Mode::Ethereal);
        assert_eq!(loaded.enabled_packs, vec!["core".to_string()]);
    }

    #[test]
    fn environment_override_wins_over_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filigree")).unwrap();
        std::fs::write(
            dir.path().join(".filigree").join("config.json"),
            r#"{"prefix": "acme", "mode": "ethereal"}"#,
        )
        .unwrap();
        // SAFETY: test is single-threaded with respect to this env var.
        unsafe {
            std::env::set_var("FILIGREE_CONFIG_MODE", "server");
        }
        let loaded = load_config(dir.path()).unwrap();
        unsafe {
            std::env::remove_var("FILIGREE_CONFIG_MODE");
        }
        assert_eq!(loaded.mode, Mode::Server);
    }
}
