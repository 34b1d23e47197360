//! The layered template registry (spec §4.3).
//!
//! Three layers, later overriding earlier: built-in packs compiled into the
//! engine, pack files under `<project>/.filigree/packs/`, and project-local
//! per-type overrides under `<project>/.filigree/templates/`. `reload()`
//! re-executes the layering and atomically replaces the in-memory index, so
//! concurrent readers always see either the old or the new registry, never
//! a half-built one (spec §9: "load all three layers into an immutable
//! value; swap with an atomic pointer/handle. No mutable singleton.").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use filigree_core::template::{Pack, Template};

use crate::builtin;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read overlay file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse overlay file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("template {type_name:?} in {path} fails self-check: {problems:?}")]
    InvalidTemplate {
        path: PathBuf,
        type_name: String,
        problems: Vec<String>,
    },
}

/// An immutable, fully-layered view of every known type and pack.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub templates: HashMap<String, Template>,
    pub packs: HashMap<String, Pack>,
}

impl RegistrySnapshot {
    pub fn get_template(&self, type_name: &str) -> Option<&Template> {
        self.templates.get(type_name)
    }

    pub fn known_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

/// Process-wide, read-mostly handle to the current [`RegistrySnapshot`]
/// (spec §5: "guarded by a readers-writers lock; `reload_templates` swaps
/// it atomically").
pub struct TemplateRegistry {
    inner: RwLock<Arc<RegistrySnapshot>>,
}

impl TemplateRegistry {
    /// Loads the registry for a project root, applying all three layers.
    pub fn load(project_root: &Path) -> Result<Self, RegistryError> {
        let snapshot = build_snapshot(project_root)?;
        Ok(Self {
            inner: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Returns a cheap clone of the current snapshot handle.
    pub fn current(&self) -> Arc<RegistrySnapshot> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    /// Re-executes the three-layer load and atomically swaps the snapshot.
    pub fn reload(&self, project_root: &Path) -> Result<(), RegistryError> {
        let snapshot = build_snapshot(project_root)?;
        let mut guard = self.inner.write().expect("registry lock poisoned");
        *guard = Arc::new(snapshot);
        Ok(())
    }
}

fn build_snapshot(project_root: &Path) -> Result<RegistrySnapshot, RegistryError> {
    let mut templates: HashMap<String, Template> = HashMap::new();
    let mut packs: HashMap<String, Pack> = HashMap::new();

    // Layer 1: built-in.
    for pack in builtin::builtin_packs() {
        packs.insert(pack.name.clone(), pack);
    }
    for template in builtin::builtin_templates() {
        templates.insert(template.type_name.clone(), template);
    }

    // Layer 2: project pack files.
    let packs_dir = project_root.join(".filigree").join("packs");
    if packs_dir.is_dir() {
        for entry in read_json_files(&packs_dir)? {
            let (path, contents) = entry;
            let overlay: PackOverlay = serde_json::from_str(&contents)
                .map_err(|source| RegistryError::Parse { path: path.clone(), source })?;
            packs.insert(overlay.pack.name.clone(), overlay.pack);
            for template in overlay.templates {
                validate_template(&path, &template)?;
                templates.insert(template.type_name.clone(), template);
            }
        }
    }

    // Layer 3: project-local per-type overrides.
    let templates_dir = project_root.join(".filigree").join("templates");
    if templates_dir.is_dir() {
        for entry in read_json_files(&templates_dir)? {
            let (path, contents) = entry;
            let template: Template = serde_json::from_str(&contents)
                .map_err(|source| RegistryError::Parse { path: path.clone(), source })?;
            validate_template(&path, &template)?;
            templates.insert(template.type_name.clone(), template);
        }
    }

    Ok(RegistrySnapshot { templates, packs })
}

fn validate_template(path: &Path, template: &Template) -> Result<(), RegistryError> {
    let problems = template.self_check();
    if !problems.is_empty() {
        return Err(RegistryError::InvalidTemplate {
            path: path.to_path_buf(),
            type_name: template.type_name.clone(),
            problems,
        });
    }
    Ok(())
}

fn read_json_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, RegistryError> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    // Deterministic layering order within a directory.
    paths.sort();
    for path in paths {
        let contents = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
            path: path.clone(),
            source,
        })?;
        out.push((path, contents));
    }
    Ok(out)
}

#[derive(Debug, serde::Deserialize)]
struct PackOverlay {
    pack: Pack,
    #[serde(default)]
    templates: Vec<Template>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_only_when_no_overlays() {
        let dir = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(dir.path()).unwrap();
        let snapshot = registry.current();
        assert!(snapshot.get_template("bug").is_some());
        assert!(snapshot.get_template("release").is_some());
    }

    #[test]
    fn project_template_override_wins() {
        let dir = TempDir::new().unwrap();
        let templates_dir = dir.path().join(".filigree").join("templates");
        std::fs::create_dir_all(&templates_dir).unwrap();
        let overridden = filigree_core::template::Template {
            type_name: "task".into(),
            display_name: "Task (custom)".into(),
            description: "overridden".into(),
            pack: "core".into(),
            initial_state: "open".into(),
            states: vec![filigree_core::template::State {
                name: "open".into(),
                category: filigree_core::template::Category::Open,
            }],
            transitions: vec![],
            field_schema: vec![],
        };
        std::fs::write(
            templates_dir.join("task.json"),
            serde_json::to_string(&overridden).unwrap(),
        )
        .unwrap();

        let registry = TemplateRegistry::load(dir.path()).unwrap();
        let snapshot = registry.current();
        assert_eq!(
            snapshot.get_template("task").unwrap().display_name,
            "Task (custom)"
        );
    }

    #[test]
    fn reload_swaps_atomically() {
        let dir = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(dir.path()).unwrap();
        let before = registry.current();
        let baseline = before.known_types().len();

        let templates_dir = dir.path().join(".filigree").join("templates");
        std::fs::create_dir_all(&templates_dir).unwrap();
        let extra = filigree_core::template::Template {
            type_name: "chore".into(),
            display_name: "Chore".into(),
            description: String::new(),
            pack: "core".into(),
            initial_state: "open".into(),
            states: vec![filigree_core::template::State {
                name: "open".into(),
                category: filigree_core::template::Category::Open,
            }],
            transitions: vec![],
            field_schema: vec![],
        };
        std::fs::write(
            templates_dir.join("chore.json"),
            serde_json::to_string(&extra).unwrap(),
        )
        .unwrap();

        registry.reload(dir.path()).unwrap();
        let after = registry.current();
        assert_eq!(after.known_types().len(), baseline + 1);
        // The handle captured before reload still sees the old snapshot.
        assert_eq!(before.known_types().len(), baseline);
    }
}
