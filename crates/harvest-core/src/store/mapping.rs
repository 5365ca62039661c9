//! Identifier → filename mapping store.
//!
//! One JSON document per save directory (`url_filename_mapping.json`), keyed by
//! entity name, each value an object of identifier → filename pairs:
//!
//! ```json
//! {
//!   "fox": { "5d41402abc4b2a76b9719d911017c592": "fox_0.jpeg" }
//! }
//! ```
//!
//! Saving is load-merge-write of the whole document with no cross-process
//! locking. Two runs sharing a save directory can lose each other's updates.

use crate::config::StoreConfig;
use crate::store::atomic::{atomic_read_json, atomic_write_json};
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Mapping of one entity: identifier → filename (base name only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMapping {
    entries: BTreeMap<String, String>,
}

impl EntityMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `identifier` was saved as `filename`.
    pub fn insert(&mut self, identifier: impl Into<String>, filename: impl Into<String>) {
        self.entries.insert(identifier.into(), filename.into());
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(String::as_str)
    }

    /// Whether `identifier` has already been acquired.
    ///
    /// Early versions of the tool wrote `filename → identifier`, so values are
    /// checked as well as keys.
    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier) || self.entries.values().any(|v| v == identifier)
    }

    /// Remove the first entry (in key order) whose filename equals `filename`.
    ///
    /// Returns the identifier that was removed. Further entries pointing at
    /// the same filename are left in place.
    pub fn remove_filename(&mut self, filename: &str) -> Option<String> {
        let key = self
            .entries
            .iter()
            .find(|(_, v)| v.as_str() == filename)
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntityMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The whole store: entity name → [`EntityMapping`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entities: BTreeMap<String, EntityMapping>,
}

impl MappingTable {
    pub fn entity(&self, entity: &str) -> Option<&EntityMapping> {
        self.entities.get(entity)
    }

    pub fn set_entity(&mut self, entity: impl Into<String>, mapping: EntityMapping) {
        self.entities.insert(entity.into(), mapping);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Handle to a mapping store file.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `{save_dir}/url_filename_mapping.json`.
    pub fn for_save_dir(save_dir: &Path) -> Self {
        Self::new(save_dir.join(StoreConfig::MAPPING_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole store. A missing file is an empty store.
    pub fn load_all(&self) -> Result<MappingTable> {
        match atomic_read_json::<MappingTable>(&self.path) {
            Ok(table) => Ok(table.unwrap_or_default()),
            Err(HarvestError::Json { message, .. }) => Err(HarvestError::MalformedStore {
                path: self.path.clone(),
                message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Load one entity's mapping, empty if the entity or the file is absent.
    pub fn load(&self, entity: &str) -> Result<EntityMapping> {
        Ok(self.load_all()?.entity(entity).cloned().unwrap_or_default())
    }

    /// Replace `entity`'s mapping and write the whole store back.
    pub fn save(&self, entity: &str, mapping: &EntityMapping) -> Result<()> {
        let mut table = self.load_all()?;
        table.set_entity(entity, mapping.clone());
        debug!(
            "Saving {} mapping entries for {} to {}",
            mapping.len(),
            entity,
            self.path.display()
        );
        atomic_write_json(&self.path, &table)
    }
}
