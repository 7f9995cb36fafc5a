//! Path validation shared by the file and HTTP steps.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

/// Resolve `path` to an absolute form, optionally requiring that it points
/// at an existing regular file. Empty paths are rejected outright.
pub fn validate_file_path(path: &str, must_exist: bool) -> Result<PathBuf> {
    if path.trim().is_empty() {
        bail!("Path must not be empty");
    }

    let path = Path::new(path);
    if must_exist {
        let resolved = path
            .canonicalize()
            .with_context(|| format!("File not found: {}", path.display()))?;
        if !resolved.is_file() {
            bail!("Not a regular file: {}", resolved.display());
        }
        log::debug!("Validated path: {} -> {}", path.display(), resolved.display());
        return Ok(resolved);
    }

    let resolved = std::path::absolute(path)
        .with_context(|| format!("Cannot resolve path: {}", path.display()))?;
    if resolved.is_dir() {
        bail!("Not a regular file: {}", resolved.display());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn existing_file_resolves_to_absolute_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("input.txt");
        fs::write(&file, "data").unwrap();

        let resolved = validate_file_path(file.to_str().unwrap(), true).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("input.txt"));
    }

    #[test]
    fn missing_file_with_must_exist_fails() {
        let err = validate_file_path("/definitely/not/here.txt", true).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn missing_file_without_must_exist_is_fine() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("to_be_written.txt");
        let resolved = validate_file_path(file.to_str().unwrap(), false).unwrap();
        assert!(resolved.is_absolute());
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = validate_file_path("  ", false).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = validate_file_path(dir.path().to_str().unwrap(), true).unwrap_err();
        assert!(err.to_string().contains("Not a regular file"));
    }
}
