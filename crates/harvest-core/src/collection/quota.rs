//! Quota arithmetic for entity directories.

use crate::{HarvestError, Result};
use std::path::Path;

/// What a run should do with one entity directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Acquire this many more images.
    Acquire(u64),
    /// The directory already holds the target count.
    AtQuota,
    /// Delete this many of the most recent files.
    Delete(u64),
}

impl QuotaDecision {
    /// Interpret a signed quota gap.
    pub fn from_gap(gap: i64) -> Self {
        match gap {
            0 => QuotaDecision::AtQuota,
            n if n > 0 => QuotaDecision::Acquire(n.unsigned_abs()),
            n => QuotaDecision::Delete(n.unsigned_abs()),
        }
    }
}

/// Count regular files directly inside `dir`; 0 if it does not exist.
pub fn count_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir).map_err(|e| HarvestError::io_with_path(e, dir))? {
        let entry = entry.map_err(|e| HarvestError::io_with_path(e, dir))?;
        let file_type = entry
            .file_type()
            .map_err(|e| HarvestError::io_with_path(e, entry.path()))?;
        if file_type.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// `target_count - current_count`; negative when the directory is over quota.
pub fn remaining(dir: &Path, target_count: i64) -> Result<i64> {
    let current = i64::try_from(count_files(dir)?).unwrap_or(i64::MAX);
    Ok(target_count.saturating_sub(current))
}

/// How many images to request this run: `min(desired, remaining(dir, desired))`.
///
/// Evaluate once per run before acquisition starts.
pub fn adjust(dir: &Path, desired: i64) -> Result<i64> {
    Ok(desired.min(remaining(dir, desired)?))
}

/// An entity directory whose file count differs from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaShortfall {
    pub entity: String,
    pub current: usize,
    pub target: usize,
}

/// List entity directories under `base_dir` that are not exactly at `target`.
///
/// Results are sorted by entity name. An empty list means every directory
/// meets the quota.
pub fn audit_quotas(base_dir: &Path, target: usize) -> Result<Vec<QuotaShortfall>> {
    let mut shortfalls = Vec::new();
    let entries = std::fs::read_dir(base_dir).map_err(|e| HarvestError::io_with_path(e, base_dir))?;

    for entry in entries {
        let entry = entry.map_err(|e| HarvestError::io_with_path(e, base_dir))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let current = count_files(&path)?;
        if current != target {
            shortfalls.push(QuotaShortfall {
                entity: entry.file_name().to_string_lossy().into_owned(),
                current,
                target,
            });
        }
    }

    shortfalls.sort_by(|a, b| a.entity.cmp(&b.entity));
    Ok(shortfalls)
}
