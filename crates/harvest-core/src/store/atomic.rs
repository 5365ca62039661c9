//! Atomic file operations for JSON persistence.
//!
//! Writes go to a temp file with a PID suffix, are synced, then renamed
//! over the target, so a crash mid-write never leaves a truncated store.
//! This does not serialize concurrent writers; the last rename wins.

use crate::{HarvestError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use tracing::debug;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read(path).map_err(|e| HarvestError::Io {
        message: format!("Failed to read {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    // Invalid UTF-8 surfaces as a parse error, not an I/O error.
    let data: T = serde_json::from_slice(&contents).map_err(|e| HarvestError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically, pretty-printed.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| HarvestError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| HarvestError::Json {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| HarvestError::Io {
                message: format!("Failed to create temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.write_all(serialized.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                HarvestError::Io {
                    message: format!("Failed to write temp file {}", temp_path.display()),
                    path: Some(temp_path.clone()),
                    source: Some(e),
                }
            })?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        HarvestError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}
