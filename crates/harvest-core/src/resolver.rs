//! Image resolver: turns a candidate into a saved file.
//!
//! For each candidate the resolver:
//! - rejects sources matching the keyword denylist, and optionally remote
//!   sources whose HEAD response is not an image type
//! - skips sources whose identifier the entity already owns
//! - decodes inline `data:` payloads or fetches remote URLs
//! - discards bodies below the minimum size threshold
//! - writes the bytes under the next sequential filename and records the
//!   identifier in the entity's mapping
//!
//! Nothing here is fatal to an entity: every failure becomes a
//! [`CandidateOutcome`] and the caller moves on to the next candidate.

use crate::browser::Candidate;
use crate::collection::{extension_for_content_type, next_filename};
use crate::config::{HarvestConfig, NetworkConfig, SearchConfig, StoreConfig};
use crate::identity::identify;
use crate::network::{retry_async, FetchedBody, HttpClient, RetryPolicy};
use crate::store::EntityMapping;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Remote image access used by the resolver.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Content type declared by a metadata-only request.
    async fn content_type(&self, url: &str) -> Result<Option<String>>;

    /// Full response body.
    async fn fetch(&self, url: &str) -> Result<FetchedBody>;
}

#[async_trait]
impl ImageFetcher for HttpClient {
    async fn content_type(&self, url: &str) -> Result<Option<String>> {
        self.head_content_type(url).await
    }

    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        let policy = RetryPolicy::new()
            .with_max_attempts(NetworkConfig::FETCH_RETRY_ATTEMPTS)
            .with_base_delay(NetworkConfig::FETCH_RETRY_DELAY);
        let (result, _) =
            retry_async(&policy, || self.get_bytes(url), HarvestError::is_retryable).await;
        result
    }
}

/// A parsed candidate source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `data:image/<subtype>;base64,<payload>`
    Inline { extension: String, payload: String },
    /// Absolute http(s) URL.
    Remote(Url),
}

/// Whether `source` contains a denylisted keyword.
///
/// Case-sensitive: inline sources carry base64 payloads, where mixed-case
/// runs like `Icon` are ordinary data.
pub fn is_denylisted(source: &str) -> bool {
    SearchConfig::DENYLIST.iter().any(|kw| source.contains(kw))
}

/// Classify a raw source string, resolving relative URLs against `base`.
pub fn parse_source(source: &str, base: &Url) -> Result<ImageSource> {
    if let Some(rest) = source.strip_prefix("data:") {
        let (header, payload) = rest.split_once(',').ok_or_else(|| HarvestError::Decode {
            message: "inline source has no payload".into(),
        })?;
        let mut params = header.split(';');
        let mime = params.next().unwrap_or_default();
        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(HarvestError::Decode {
                message: format!("unsupported inline encoding: {}", header),
            });
        }
        let extension = extension_for_content_type(mime)
            .unwrap_or_else(|| StoreConfig::FALLBACK_EXTENSION.to_string());
        return Ok(ImageSource::Inline {
            extension,
            payload: payload.to_string(),
        });
    }

    let url = base.join(source).map_err(|e| HarvestError::InvalidSource {
        message: format!("{}: {}", source, e),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(ImageSource::Remote(url)),
        scheme => Err(HarvestError::InvalidSource {
            message: format!("unsupported scheme {} in {}", scheme, source),
        }),
    }
}

/// What happened to one candidate.
#[derive(Debug)]
pub enum CandidateOutcome {
    Saved { identifier: String, filename: String },
    /// The entity already owns this identifier.
    Duplicate,
    Rejected { reason: &'static str },
    /// Body smaller than the configured threshold.
    TooSmall { len: usize },
    Failed(HarvestError),
}

impl CandidateOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, CandidateOutcome::Saved { .. })
    }

    /// Whether processing the same source again would end the same way.
    ///
    /// Network and filesystem failures are not final; a later round may
    /// offer the source again.
    pub fn is_final(&self) -> bool {
        match self {
            CandidateOutcome::Failed(e) => matches!(
                e,
                HarvestError::InvalidSource { .. } | HarvestError::Decode { .. }
            ),
            _ => true,
        }
    }
}

/// Validates, fetches and stores candidates for one run.
pub struct ImageResolver<F> {
    fetcher: F,
    base_url: Url,
    min_size: u64,
    check_content_type: bool,
}

impl<F: ImageFetcher> ImageResolver<F> {
    pub fn new(fetcher: F, config: &HarvestConfig) -> Result<Self> {
        let base_url = Url::parse(&config.search_base_url).map_err(|e| HarvestError::Config {
            message: format!("Invalid search base URL {}: {}", config.search_base_url, e),
        })?;
        Ok(Self {
            fetcher,
            base_url,
            min_size: config.min_image_size_threshold,
            check_content_type: config.check_content_type,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Cheap plausibility check before anything is downloaded.
    ///
    /// A failed content-type check counts as invalid.
    pub async fn is_valid_image(&self, source: &str) -> bool {
        if is_denylisted(source) {
            debug!("Denylisted source: {}", abbreviate(source));
            return false;
        }
        if !self.check_content_type {
            return true;
        }

        match parse_source(source, &self.base_url) {
            Ok(ImageSource::Inline { .. }) => true,
            Ok(ImageSource::Remote(url)) => {
                self.has_image_content_type(&url).await.unwrap_or_else(|e| {
                    debug!("Content-type check failed for {}: {}", url, e);
                    false
                })
            }
            Err(_) => false,
        }
    }

    async fn has_image_content_type(&self, url: &Url) -> Result<bool> {
        Ok(self
            .fetcher
            .content_type(url.as_str())
            .await?
            .is_some_and(|content_type| content_type.contains("image")))
    }

    /// Run one candidate through the pipeline, recording a saved image in `mapping`.
    pub async fn process(
        &self,
        candidate: &Candidate,
        entity: &str,
        dir: &Path,
        mapping: &mut EntityMapping,
    ) -> CandidateOutcome {
        match self.try_process(candidate, entity, dir, mapping).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Skipping candidate {}: {}", abbreviate(&candidate.source), e);
                CandidateOutcome::Failed(e)
            }
        }
    }

    async fn try_process(
        &self,
        candidate: &Candidate,
        entity: &str,
        dir: &Path,
        mapping: &mut EntityMapping,
    ) -> Result<CandidateOutcome> {
        let source = candidate.source.as_str();
        if is_denylisted(source) {
            debug!("Denylisted source: {}", abbreviate(source));
            return Ok(CandidateOutcome::Rejected {
                reason: "denylisted keyword",
            });
        }
        let parsed = parse_source(source, &self.base_url)?;
        if let ImageSource::Remote(url) = &parsed {
            // A failed check is reported as a failure so a later round can retry it.
            if self.check_content_type && !self.has_image_content_type(url).await? {
                return Ok(CandidateOutcome::Rejected {
                    reason: "not an image content type",
                });
            }
        }

        let identifier = identify(source);
        if mapping.contains_identifier(&identifier) {
            debug!("Already acquired: {}", abbreviate(source));
            return Ok(CandidateOutcome::Duplicate);
        }

        let (bytes, extension) = self.resolve_bytes(parsed).await?;
        if (bytes.len() as u64) < self.min_size {
            debug!(
                "Discarding {} byte image (threshold {})",
                bytes.len(),
                self.min_size
            );
            return Ok(CandidateOutcome::TooSmall { len: bytes.len() });
        }

        let path = next_filename(dir, entity, &extension)?;
        write_new(&path, &bytes)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        mapping.insert(identifier.clone(), filename.clone());

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(CandidateOutcome::Saved {
            identifier,
            filename,
        })
    }

    async fn resolve_bytes(&self, source: ImageSource) -> Result<(Vec<u8>, String)> {
        match source {
            ImageSource::Inline { extension, payload } => {
                let bytes = general_purpose::STANDARD
                    .decode(payload.trim())
                    .map_err(|e| HarvestError::Decode {
                        message: e.to_string(),
                    })?;
                Ok((bytes, extension))
            }
            ImageSource::Remote(url) => {
                let body = self.fetcher.fetch(url.as_str()).await?;
                let extension = body
                    .content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .unwrap_or_else(|| StoreConfig::FALLBACK_EXTENSION.to_string());
                Ok((body.bytes, extension))
            }
        }
    }
}

/// Write `bytes` to a file that must not exist yet.
fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
    write_new_with(path, |file| file.write_all(bytes).and_then(|_| file.sync_all()))
}

/// Create `path` and fill it with `write`. A partial file is removed on failure.
fn write_new_with(path: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| HarvestError::io_with_path(e, path))?;

    if let Err(e) = write(&mut file) {
        drop(file);
        if let Err(remove_err) = std::fs::remove_file(path) {
            warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
        }
        return Err(HarvestError::io_with_path(e, path));
    }
    Ok(())
}

/// Inline payloads can be megabytes long.
fn abbreviate(source: &str) -> &str {
    match source.char_indices().nth(80) {
        Some((idx, _)) => &source[..idx],
        None => source,
    }
}
