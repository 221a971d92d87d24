//! Local storage for entity configs (`~/.config/dropship/<kind>/<id>.json`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Config file operations used by the entity store.
pub trait FileSystem {
    fn read(&self, path: &Path) -> Result<String>;
    /// Replace `path` atomically, creating its parent directory if needed.
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    /// `*.json` files directly inside `dir`, sorted by name. Missing dir is empty.
    fn list_json(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn delete(&self, path: &Path) -> Result<()>;
}

pub struct LocalFs;

fn io_error(e: std::io::Error, context: &str, path: &Path) -> Error {
    Error::internal_io(e.to_string(), Some(format!("{} {}", context, path.display())))
}

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| io_error(e, "read", path))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        let (parent, filename) = match (path.parent(), path.file_name()) {
            (Some(parent), Some(filename)) => (parent, filename),
            _ => {
                return Err(Error::internal_io(
                    format!("Invalid path: {}", path.display()),
                    Some("write config".to_string()),
                ))
            }
        };

        fs::create_dir_all(parent).map_err(|e| io_error(e, "create", parent))?;

        // Temp name is per-process so concurrent invocations never share it.
        let tmp_path = parent.join(format!(
            ".{}.{}.tmp",
            filename.to_string_lossy(),
            std::process::id()
        ));
        fs::write(&tmp_path, content).map_err(|e| io_error(e, "write", &tmp_path))?;

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_error(e, "rename", path));
        }
        Ok(())
    }

    fn list_json(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir).map_err(|e| io_error(e, "list", dir))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| io_error(e, "delete", path))
    }
}

pub fn local() -> LocalFs {
    LocalFs
}

/// File stem of a config path, i.e. the entity ID.
pub fn entity_id(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().to_string())
}
