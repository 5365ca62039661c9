//! Configuration for Harvest.
//!
//! Two kinds of configuration live here:
//! - Fixed tunables (`SearchConfig`, `NetworkConfig`, `StoreConfig`) that describe the
//!   browser environment and on-disk layout and are not negotiable per call.
//! - [`HarvestConfig`], the per-run values read from a JSON file and threaded
//!   explicitly into every component. It is never mutated after loading.

use crate::store::atomic_read_json;
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Search page and browser session parameters.
pub struct SearchConfig;

impl SearchConfig {
    pub const CONSENT_SELECTOR: &'static str = "#L2AGLb";
    pub const CONSENT_MAX_ATTEMPTS: u32 = 5;
    pub const CONSENT_WAIT: Duration = Duration::from_secs(20);
    pub const CONSENT_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Consecutive rounds without page growth before scrolling stops.
    pub const STALL_LIMIT: u32 = 3;

    /// Leading `<img>` elements that belong to the search chrome.
    pub const SKIP_LEADING_IMAGES: usize = 3;

    pub const WINDOW_WIDTH: u32 = 1920;
    pub const WINDOW_HEIGHT: u32 = 1080;

    /// Source substrings that mark non-content images.
    pub const DENYLIST: &'static [&'static str] = &["logo", "icon", "sprite"];
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const FETCH_RETRY_ATTEMPTS: u32 = 2;
    pub const FETCH_RETRY_DELAY: Duration = Duration::from_millis(500);
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (X11; Linux x86_64) Harvest/0.3";
}

/// On-disk layout.
pub struct StoreConfig;

impl StoreConfig {
    pub const MAPPING_FILE_NAME: &'static str = "url_filename_mapping.json";
    pub const FALLBACK_EXTENSION: &'static str = "jpeg";
}

/// Per-run configuration.
///
/// Keys follow the SCREAMING_SNAKE_CASE layout of the tool's `config.json`;
/// the older dataset-oriented key names are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct HarvestConfig {
    /// Images smaller than this many bytes are treated as thumbnails and discarded.
    pub min_image_size_threshold: u64,
    /// Desired number of files per entity directory.
    #[serde(alias = "TRAIN_IMAGES_PER_ENTITIES")]
    pub target_count: i64,
    /// Base directory holding one sub-directory per entity and the mapping store.
    #[serde(alias = "TRAIN_IMAGES_PATH")]
    pub save_dir: PathBuf,
    /// Line-delimited entity list.
    #[serde(alias = "ENTITIES_NAMES_PATH")]
    pub entities_path: PathBuf,
    /// Appended to the entity name to form the search query.
    pub query_suffix: String,
    /// Search engine origin; relative image URLs resolve against it.
    pub search_base_url: String,
    /// WebDriver endpoint (chromedriver, selenium, ...).
    pub webdriver_url: String,
    /// Issue a HEAD request and require an `image/*` content type for remote sources.
    pub check_content_type: bool,
    pub settle_delay_ms: u64,
    /// Upper bound on scroll rounds per entity.
    pub max_scroll_rounds: u32,
    /// Streaming fetches abort past this size.
    pub max_image_bytes: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            min_image_size_threshold: 1000,
            target_count: 100,
            save_dir: PathBuf::from("images"),
            entities_path: PathBuf::from("entities.txt"),
            query_suffix: " animal".to_string(),
            search_base_url: "https://www.google.com".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            check_content_type: true,
            settle_delay_ms: 2000,
            max_scroll_rounds: 50,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: HarvestConfig = atomic_read_json(path)?.ok_or_else(|| HarvestError::Config {
            message: format!("Config file not found: {}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.save_dir.as_os_str().is_empty() {
            return Err(HarvestError::Validation {
                field: "SAVE_DIR".into(),
                message: "must not be empty".into(),
            });
        }
        if self.target_count < 0 {
            return Err(HarvestError::Validation {
                field: "TARGET_COUNT".into(),
                message: format!("must be non-negative, got {}", self.target_count),
            });
        }
        if url::Url::parse(&self.search_base_url).is_err() {
            return Err(HarvestError::Validation {
                field: "SEARCH_BASE_URL".into(),
                message: format!("not a valid URL: {}", self.search_base_url),
            });
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Path of the mapping store for this save directory.
    pub fn mapping_path(&self) -> PathBuf {
        self.save_dir.join(StoreConfig::MAPPING_FILE_NAME)
    }

    /// Directory holding an entity's images.
    pub fn entity_dir(&self, entity: &str) -> PathBuf {
        self.save_dir.join(entity)
    }
}
