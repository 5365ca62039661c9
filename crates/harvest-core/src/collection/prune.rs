//! Trimming over-quota entity directories.
//!
//! Acquisition appends files with increasing indices, so the most recently
//! modified files are the most recently acquired ones. Removing those undoes
//! the last N acquisitions and leaves the long-standing set intact.

use crate::store::MappingStore;
use crate::{HarvestError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Regular files in `dir`, oldest first by modification time.
fn files_by_mtime(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| HarvestError::io_with_path(e, dir))? {
        let entry = entry.map_err(|e| HarvestError::io_with_path(e, dir))?;
        let metadata = entry
            .metadata()
            .map_err(|e| HarvestError::io_with_path(e, entry.path()))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| HarvestError::io_with_path(e, entry.path()))?;
        files.push((modified, entry.path()));
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Delete the `count` most recently modified files of `dir` and drop their
/// entries from `entity`'s mapping.
///
/// A `count` of zero or less is a no-op. Returns the deleted paths, oldest first.
pub fn delete_excess(
    dir: &Path,
    entity: &str,
    count: i64,
    store: &MappingStore,
) -> Result<Vec<PathBuf>> {
    if count <= 0 || !dir.is_dir() {
        return Ok(Vec::new());
    }

    let files = files_by_mtime(dir)?;
    let to_delete = usize::try_from(count).unwrap_or(usize::MAX).min(files.len());
    let victims = files[files.len() - to_delete..].to_vec();

    for file in &victims {
        std::fs::remove_file(file).map_err(|e| HarvestError::io_with_path(e, file))?;

        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut mapping = store.load(entity)?;
        match mapping.remove_filename(&filename) {
            Some(identifier) => debug!("Dropped mapping {} -> {}", identifier, filename),
            None => debug!("No mapping entry for {}", filename),
        }
        store.save(entity, &mapping)?;

        info!("Deleted: {}", file.display());
    }

    Ok(victims)
}
