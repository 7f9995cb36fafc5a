//! Filesystem steps: read, write, copy, move, delete, list.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::paths::validate_file_path;
use crate::step::{Context, Step};
use crate::steps::{configured_or_input, render_text};

/// Read a file and return its contents.
///
/// The path comes from config or, when unset, from a string payload.
/// Context: `file_path`, `file_size`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFile {
    #[serde(default)]
    pub path: Option<String>,
}

impl Step for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let path = configured_or_input(self.path.as_deref(), &data, "path")?;
        let resolved = validate_file_path(path, true)?;

        let contents = fs::read_to_string(&resolved)
            .with_context(|| format!("Failed to read {}", resolved.display()))?;

        context.insert("file_size".to_string(), json!(contents.len()));
        context.insert("file_path".to_string(), json!(resolved.display().to_string()));

        log::info!("Read {} bytes from {}", contents.len(), resolved.display());
        Ok(Value::String(contents))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum WriteMode {
    #[default]
    #[serde(rename = "w")]
    Overwrite,
    #[serde(rename = "a")]
    Append,
}

/// Write the stringified payload to a file, creating parent directories.
/// Returns the written path. Context: `bytes_written`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFile {
    pub path: String,
    #[serde(default)]
    pub mode: WriteMode,
}

impl Step for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let path = validate_file_path(&self.path, false)?;
        ensure_parent_dir(&path)?;

        let text = render_text(&data);
        match self.mode {
            WriteMode::Overwrite => fs::write(&path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            WriteMode::Append => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Failed to open {} for append", path.display()))?;
                file.write_all(text.as_bytes())
                    .with_context(|| format!("Failed to append to {}", path.display()))?;
            }
        }

        let bytes_written = fs::metadata(&path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        context.insert("bytes_written".to_string(), json!(bytes_written));

        log::info!("Wrote {} bytes to {}", bytes_written, path.display());
        Ok(json!(path.display().to_string()))
    }
}

/// Copy a file. Source comes from config or a string payload; returns the
/// destination path. Context: `source_path`, `dest_path`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyFile {
    #[serde(default)]
    pub src: Option<String>,
    pub dest: String,
}

impl Step for CopyFile {
    fn name(&self) -> &'static str {
        "copy_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let src = validate_file_path(
            configured_or_input(self.src.as_deref(), &data, "source path")?,
            true,
        )?;
        let dest = validate_file_path(&self.dest, false)?;
        ensure_parent_dir(&dest)?;

        log::info!("Copying {} -> {}", src.display(), dest.display());
        fs::copy(&src, &dest)
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;

        context.insert("source_path".to_string(), json!(src.display().to_string()));
        context.insert("dest_path".to_string(), json!(dest.display().to_string()));

        Ok(json!(dest.display().to_string()))
    }
}

/// Move or rename a file. Falls back to copy-and-delete when a plain
/// rename fails (for example across filesystems).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveFile {
    #[serde(default)]
    pub src: Option<String>,
    pub dest: String,
}

impl Step for MoveFile {
    fn name(&self) -> &'static str {
        "move_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let src = validate_file_path(
            configured_or_input(self.src.as_deref(), &data, "source path")?,
            true,
        )?;
        let dest = validate_file_path(&self.dest, false)?;
        ensure_parent_dir(&dest)?;

        log::info!("Moving {} -> {}", src.display(), dest.display());
        if fs::rename(&src, &dest).is_err() {
            fs::copy(&src, &dest).with_context(|| {
                format!("Failed to move {} to {}", src.display(), dest.display())
            })?;
            fs::remove_file(&src)
                .with_context(|| format!("Failed to remove {} after copy", src.display()))?;
        }

        context.insert("source_path".to_string(), json!(src.display().to_string()));
        context.insert("dest_path".to_string(), json!(dest.display().to_string()));

        Ok(json!(dest.display().to_string()))
    }
}

/// Delete a file and return `true`. Context: `deleted_path`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFile {
    #[serde(default)]
    pub path: Option<String>,
}

impl Step for DeleteFile {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let path = validate_file_path(
            configured_or_input(self.path.as_deref(), &data, "path")?,
            true,
        )?;

        log::info!("Deleting file: {}", path.display());
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;

        context.insert("deleted_path".to_string(), json!(path.display().to_string()));
        Ok(Value::Bool(true))
    }
}

/// List files matching a glob pattern under a directory. Returns the
/// sorted paths. Context: `file_count`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFiles {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

impl Step for ListFiles {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn run(&self, _data: Value, context: &mut Context) -> Result<Value> {
        let full_pattern = Path::new(&self.directory)
            .join(&self.pattern)
            .to_string_lossy()
            .into_owned();

        let mut files: Vec<String> = glob::glob(&full_pattern)
            .with_context(|| format!("Invalid glob pattern '{full_pattern}'"))?
            .filter_map(std::result::Result::ok)
            .filter(|path| path.is_file())
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        files.sort();

        context.insert("file_count".to_string(), json!(files.len()));
        log::info!("Found {} files matching '{}'", files.len(), full_pattern);

        Ok(json!(files))
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
