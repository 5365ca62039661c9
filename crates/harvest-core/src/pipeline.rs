//! Per-entity pipeline: quota decision, then acquire or prune.

use crate::browser::{BrowserLauncher, SearchController};
use crate::collection::{adjust, delete_excess, QuotaDecision};
use crate::config::HarvestConfig;
use crate::resolver::{ImageFetcher, ImageResolver};
use crate::store::{EntityMapping, MappingStore};
use crate::{HarvestError, Result};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Image search URL for `entity`: `<base>/search?q=<entity><suffix>&tbm=isch`.
pub fn build_search_url(base: &str, entity: &str, suffix: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .and_then(|base| base.join("/search"))
        .map_err(|e| HarvestError::Config {
            message: format!("Invalid search base URL {}: {}", base, e),
        })?;
    url.query_pairs_mut()
        .append_pair("q", &format!("{}{}", entity, suffix))
        .append_pair("tbm", "isch");
    Ok(url)
}

/// Result of one entity's pipeline.
#[derive(Debug)]
pub enum EntityOutcome {
    /// A search ran; `acquired` may fall short of `requested` if results ran out.
    Acquired { acquired: u64, requested: u64 },
    Pruned { removed: usize },
    AtQuota,
    /// The entity was abandoned; the run continued.
    Failed { error: HarvestError },
}

impl fmt::Display for EntityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityOutcome::Acquired {
                acquired,
                requested,
            } => write!(f, "acquired {}/{}", acquired, requested),
            EntityOutcome::Pruned { removed } => write!(f, "deleted {} excess files", removed),
            EntityOutcome::AtQuota => write!(f, "already at quota"),
            EntityOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Everything needed to process entities one after another.
pub struct EntityPipeline<L, F> {
    config: HarvestConfig,
    launcher: L,
    resolver: ImageResolver<F>,
    store: MappingStore,
}

impl<L: BrowserLauncher, F: ImageFetcher> EntityPipeline<L, F> {
    pub fn new(config: HarvestConfig, launcher: L, fetcher: F) -> Result<Self> {
        config.validate()?;
        let resolver = ImageResolver::new(fetcher, &config)?;
        let store = MappingStore::new(config.mapping_path());
        Ok(Self {
            config,
            launcher,
            resolver,
            store,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn fetcher(&self) -> &F {
        self.resolver.fetcher()
    }

    /// Bring `entity`'s directory to the target count.
    ///
    /// The quota is measured once, before any browser is launched.
    pub async fn run(&self, entity: &str) -> Result<EntityOutcome> {
        let dir = self.config.entity_dir(entity);
        let planned = adjust(&dir, self.config.target_count)?;

        match QuotaDecision::from_gap(planned) {
            QuotaDecision::AtQuota => Ok(EntityOutcome::AtQuota),
            QuotaDecision::Delete(_) => {
                let removed = delete_excess(&dir, entity, planned.saturating_neg(), &self.store)?;
                Ok(EntityOutcome::Pruned {
                    removed: removed.len(),
                })
            }
            QuotaDecision::Acquire(requested) => self.acquire(entity, &dir, requested).await,
        }
    }

    async fn acquire(&self, entity: &str, dir: &Path, requested: u64) -> Result<EntityOutcome> {
        std::fs::create_dir_all(dir).map_err(|e| HarvestError::io_with_path(e, dir))?;
        let mut mapping = self.store.load(entity)?;
        let search_url = build_search_url(
            &self.config.search_base_url,
            entity,
            &self.config.query_suffix,
        )?;

        let driver = self.launcher.launch().await?;
        let mut controller = SearchController::new(
            driver,
            self.config.settle_delay(),
            self.config.max_scroll_rounds,
        );

        let result = self
            .collect(
                &mut controller,
                &search_url,
                entity,
                dir,
                &mut mapping,
                requested,
            )
            .await;
        if let Err(e) = controller.finish().await {
            warn!("Failed to close browser session for {}: {}", entity, e);
        }

        let acquired = result?;
        if acquired < requested {
            warn!(
                "{}: results exhausted after {} rounds with {}/{} images",
                entity,
                controller.rounds(),
                acquired,
                requested
            );
        }
        Ok(EntityOutcome::Acquired {
            acquired,
            requested,
        })
    }

    async fn collect(
        &self,
        controller: &mut SearchController<L::Driver>,
        search_url: &Url,
        entity: &str,
        dir: &Path,
        mapping: &mut EntityMapping,
        requested: u64,
    ) -> Result<u64> {
        controller.open(search_url.as_str()).await?;

        let mut acquired = 0;
        while acquired < requested {
            let Some(round) = controller.next_round().await? else {
                break;
            };

            for candidate in &round.candidates {
                if acquired >= requested {
                    break;
                }
                let outcome = self.resolver.process(candidate, entity, dir, mapping).await;
                if outcome.is_saved() {
                    acquired += 1;
                }
                if outcome.is_final() {
                    controller.mark_seen(&candidate.source);
                }
            }

            self.store.save(entity, mapping)?;
            info!(
                "[Round {}] {}: acquired {}/{} images",
                round.index, entity, acquired, requested
            );
        }
        Ok(acquired)
    }
}
