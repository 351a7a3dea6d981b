//! Corpus location utilities

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Directory holding per-project state
pub const STATE_DIR: &str = ".corpusflower";

/// Where a new corpus named `name` lives in the current project
pub fn local_index_path(name: &str) -> PathBuf {
    PathBuf::from(STATE_DIR).join("indexes").join(name)
}

/// Find a corpus by name in the current project or global registry
///
/// Search order:
/// 1. Local project: `.corpusflower/indexes/<name>`
/// 2. Absolute path (if provided)
/// 3. Global user registry: `~/.corpusflower/indexes/<name>`
pub fn find_index(name: &str) -> Result<PathBuf> {
    let local_path = local_index_path(name);
    if local_path.exists() {
        return Ok(local_path);
    }

    let abs_path = PathBuf::from(name);
    if abs_path.is_absolute() && abs_path.exists() {
        return Ok(abs_path);
    }

    if let Some(home) = dirs::home_dir() {
        let global_path = home.join(STATE_DIR).join("indexes").join(name);
        if global_path.exists() {
            return Ok(global_path);
        }
    }

    Err(Error::IndexNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_index_not_found() {
        let result = find_index("nonexistent-corpus-12345");
        assert!(matches!(result, Err(Error::IndexNotFound(_))));
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_find_index_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().to_string_lossy().to_string();
        assert_eq!(find_index(&name).unwrap(), dir.path());
    }

    #[test]
    fn test_local_index_path() {
        assert_eq!(local_index_path("books"), PathBuf::from(".corpusflower/indexes/books"));
    }
}
