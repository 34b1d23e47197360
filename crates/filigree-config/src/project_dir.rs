//! Discovery and atomic initialization of the `.filigree/` directory.
//! Grounded in the teacher's `beads-config::beads_dir` module, generalized
//! to the copy-then-swap initialization scheme resolved in §13 of the
//! expanded spec.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const FILIGREE_DIR_NAME: &str = ".filigree";
const FILIGREE_DIR_ENV: &str = "FILIGREE_DIR";

/// Walks up the directory tree from `start` looking for a `.filigree/`
/// directory. The `FILIGREE_DIR` environment variable is checked first.
pub fn find_filigree_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(FILIGREE_DIR_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    let mut current = start.as_path();
    loop {
        let candidate = current.join(FILIGREE_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }
    None
}

pub fn find_filigree_dir_or_error(start: &Path) -> Result<PathBuf, ConfigError> {
    find_filigree_dir(start).ok_or(ConfigError::FiligreeDirNotFound)
}

/// The project root is the parent of the discovered `.filigree/`
/// directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    find_filigree_dir(start).and_then(|dir| dir.parent().map(Path::to_path_buf))
}

/// Builds a fresh `.filigree/` tree in a sibling temp directory and
/// renames it into place — a `std::fs::rename` is atomic on same-filesystem
/// renames, so a concurrently-running reader never observes a
/// half-initialized directory (§13 resolution #2). Fails if `.filigree/`
/// already exists at `project_root`.
pub fn init_filigree_dir(
    project_root: &Path,
    build: impl FnOnce(&Path) -> std::io::Result<()>,
) -> Result<PathBuf, ConfigError> {
    let target = project_root.join(FILIGREE_DIR_NAME);
    if target.is_dir() {
        return Err(ConfigError::InvalidValue {
            key: "project_root".into(),
            reason: format!("{} already exists", target.display()),
        });
    }

    let tmp = project_root.join(format!(".filigree.tmp-{}", std::process::id()));
    if tmp.exists() {
        std::fs::remove_dir_all(&tmp)?;
    }
    std::fs::create_dir_all(&tmp)?;

    build(&tmp)?;

    std::fs::rename(&tmp, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_filigree_dir_at_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".filigree")).unwrap();
        let found = find_filigree_dir(dir.path()).unwrap().canonicalize().unwrap();
        let expected = dir.path().join(".filigree").canonicalize().unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn finds_filigree_dir_from_child() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".filigree")).unwrap();
        let child = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&child).unwrap();
        let found = find_filigree_dir(&child).unwrap().canonicalize().unwrap();
        let expected = dir.path().join(".filigree").canonicalize().unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn project_root_is_parent_of_filigree_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".filigree")).unwrap();
        let root = find_project_root(dir.path()).unwrap().canonicalize().unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn init_builds_then_renames_atomically() {
        let dir = TempDir::new().unwrap();
        let result = init_filigree_dir(dir.path(), |tmp| {
            std::fs::write(tmp.join("config.json"), "{}")?;
            Ok(())
        })
        .unwrap();
        assert!(result.is_dir());
        assert!(result.join("config.json").is_file());
        assert!(!dir.path().join(format!(".filigree.tmp-{}", std::process::id())).exists());
    }

    #[test]
    fn init_fails_if_already_initialized() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".filigree")).unwrap();
        let err = init_filigree_dir(dir.path(), |_| Ok(())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn init_cleans_up_stale_tmp_dir_from_a_previous_crash() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join(format!(".filigree.tmp-{}", std::process::id()));
        std::fs::create_dir_all(tmp.join("leftover")).unwrap();
        init_filigree_dir(dir.path(), |tmp| std::fs::write(tmp.join("config.json"), "{}")).unwrap();
        assert!(dir.path().join(".filigree").join("config.json").is_file());
    }
}
