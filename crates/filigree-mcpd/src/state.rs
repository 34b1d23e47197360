//! Shared engine handles the tool dispatcher closes over.

use std::path::PathBuf;

use filigree_storage::SqliteStore;
use filigree_templates::TemplateRegistry;

pub struct ServerState {
    pub store: SqliteStore,
    pub registry: TemplateRegistry,
    pub prefix: String,
    #[allow(dead_code)]
    pub project_root: PathBuf,
}
