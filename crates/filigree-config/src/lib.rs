//! Project configuration loading and `.filigree/` directory discovery
//! (spec §6, §10.3). Grounded in the teacher's `beads-config` crate, with
//! JSON in place of YAML since the product format is explicitly JSON.

pub mod config;
pub mod error;
pub mod project_dir;

pub use config::{Mode, ProjectConfig, load_config, save_config};
pub use error::ConfigError;
pub use project_dir::{find_filigree_dir, find_filigree_dir_or_error, find_project_root, init_filigree_dir};
