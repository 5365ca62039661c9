//! Sequential filenames inside an entity directory.
//!
//! Files are named `<entity>_<index>.<ext>`; indices are unique per directory
//! and per extension, and grow from the highest index already present.

use crate::{HarvestError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters allowed in an extension taken from a content type.
static EXTENSION_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,10}$").unwrap());

/// Build the matcher for `<entity>_<index>.<ext>`.
fn filename_pattern(entity: &str, ext: &str) -> Result<Regex> {
    let pattern = format!(r"^{}_(\d+)\.{}$", regex::escape(entity), regex::escape(ext));
    Regex::new(&pattern).map_err(|e| HarvestError::Validation {
        field: "entity".into(),
        message: format!("Cannot build filename pattern for {}: {}", entity, e),
    })
}

/// Extract the sequence index from `filename` if it follows the naming pattern.
pub fn parse_index(filename: &str, entity: &str, ext: &str) -> Option<u64> {
    let pattern = filename_pattern(entity, ext).ok()?;
    pattern
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Compute the next free path `<dir>/<entity>_<index>.<ext>`.
///
/// The index is one past the highest index among existing files with the same
/// entity and extension, or 0 if there are none. The file is not created;
/// write it immediately to keep the window for a competing writer small.
pub fn next_filename(dir: &Path, entity: &str, ext: &str) -> Result<PathBuf> {
    let pattern = filename_pattern(entity, ext)?;

    let mut max_index: Option<u64> = None;
    if dir.exists() {
        let entries = std::fs::read_dir(dir).map_err(|e| HarvestError::io_with_path(e, dir))?;
        for entry in entries {
            let entry = entry.map_err(|e| HarvestError::io_with_path(e, dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let index = pattern
                .captures(name)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok());
            if let Some(index) = index {
                max_index = Some(max_index.map_or(index, |m| m.max(index)));
            }
        }
    }

    let next = max_index.map_or(0, |m| m + 1);
    Ok(dir.join(format!("{}_{}.{}", entity, next, ext)))
}

/// Map an `image/<subtype>` content type to a file extension.
///
/// Returns `None` for non-image types and subtypes that do not make a sane
/// extension.
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/")?;
    let ext = match subtype {
        "jpg" | "pjpeg" => "jpeg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        other => other,
    };
    EXTENSION_CHARS.is_match(ext).then(|| ext.to_string())
}
