//! Harvest Core - quota-bounded, deduplicated image acquisition per named entity.
//!
//! For every entity in a list, the crate compares the entity's directory
//! against a target file count. Directories under quota are topped up from a
//! browser-driven image search; directories over quota lose their most
//! recently acquired files. A JSON mapping store records which sources have
//! already been saved so later runs never fetch the same image twice.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::{
//!     load_entities, run_entities, EntityPipeline, HarvestConfig, HttpClient, WebDriverLauncher,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> harvest_core::Result<()> {
//!     let config = HarvestConfig::load("config.json".as_ref())?;
//!     let entities = load_entities(&config.entities_path)?;
//!
//!     let launcher = WebDriverLauncher::new(config.webdriver_url.clone());
//!     let fetcher = HttpClient::new(config.max_image_bytes)?;
//!     let pipeline = EntityPipeline::new(config, launcher, fetcher)?;
//!
//!     let report = run_entities(&pipeline, &entities).await?;
//!     println!("Acquired {} images", report.acquired());
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod collection;
pub mod config;
pub mod error;
pub mod identity;
pub mod network;
pub mod pipeline;
pub mod resolver;
pub mod run;
pub mod store;

// Re-export commonly used types
pub use browser::{
    BrowserDriver, BrowserLauncher, Candidate, SearchController, SessionPhase, WebDriverLauncher,
};
pub use collection::{audit_quotas, QuotaDecision, QuotaShortfall};
pub use config::HarvestConfig;
pub use error::{HarvestError, Result};
pub use identity::identify;
pub use network::{FetchedBody, HttpClient, RetryPolicy};
pub use pipeline::{build_search_url, EntityOutcome, EntityPipeline};
pub use resolver::{CandidateOutcome, ImageFetcher, ImageResolver};
pub use run::{load_entities, run_entities, EntityReport, RunReport};
pub use store::{EntityMapping, MappingStore, MappingTable};
