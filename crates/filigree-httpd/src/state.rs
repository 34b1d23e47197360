//! Shared application state handed to every route handler.

use std::path::PathBuf;
use std::sync::Arc;

use filigree_storage::SqliteStore;
use filigree_templates::TemplateRegistry;

/// Cloned into every request: `SqliteStore` is itself a cheap `Arc`-backed
/// clone and `TemplateRegistry` is already internally an `RwLock<Arc<_>>`,
/// so cloning `AppState` per request costs a handful of atomic increments.
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub registry: Arc<TemplateRegistry>,
    pub project_root: PathBuf,
    pub prefix: String,
}
