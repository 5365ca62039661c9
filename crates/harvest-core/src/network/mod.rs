//! Network utilities for fetching candidate images.
//!
//! This module provides:
//! - HTTP client with content-type lookups and capped streaming fetches
//! - Bounded retry with backoff and terminal fallback

mod client;
mod retry;

pub use client::{FetchedBody, HttpClient};
pub use retry::{retry_async, retry_or_fallback, RetryPolicy, RetryStats};
