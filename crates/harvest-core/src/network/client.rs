//! HTTP client for image probing and fetching.
//!
//! Wraps reqwest with:
//! - Configurable timeout and user agent
//! - Metadata-only content-type lookups (HEAD)
//! - Streaming GET with a hard cap on body size
//! - Non-success statuses surfaced as `HttpStatus` errors

use crate::config::NetworkConfig;
use crate::{HarvestError, Result};
use futures::StreamExt;
use reqwest::{header, Client, Response};
use std::time::Duration;
use tracing::debug;

/// A fetched response body and its declared content type.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP client used by the image resolver.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_body_bytes: u64,
}

impl HttpClient {
    /// Create a client with the default request timeout.
    pub fn new(max_body_bytes: u64) -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT, max_body_bytes)
    }

    pub fn with_timeout(timeout: Duration, max_body_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| HarvestError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            max_body_bytes,
        })
    }

    /// Issue a HEAD request and return the `Content-Type` header, if any.
    pub async fn head_content_type(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .head(url)
            .timeout(NetworkConfig::PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| HarvestError::Network {
                message: format!("HEAD {} failed: {}", url, e),
                source: Some(e),
            })?;

        let response = Self::check_status(response, url)?;
        Ok(content_type_of(&response))
    }

    /// GET `url`, streaming the body into memory up to the configured cap.
    pub async fn get_bytes(&self, url: &str) -> Result<FetchedBody> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::Network {
                message: format!("GET {} failed: {}", url, e),
                source: Some(e),
            })?;

        let response = Self::check_status(response, url)?;
        let too_large = || HarvestError::ResponseTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(too_large());
        }

        let content_type = content_type_of(&response);
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() as u64 + chunk.len() as u64 > self.max_body_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(FetchedBody {
            bytes,
            content_type,
        })
    }

    fn check_status(response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
