//! Candidate image extraction from search result markup.

use crate::config::SearchConfig;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// An `<img>` found on a results page, not yet validated or fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// `src`, or `data-src` for lazy-loaded results. Either a remote
    /// (possibly relative) URL or an inline `data:` payload.
    pub source: String,
}

/// Collect candidates in DOM order.
///
/// The first [`SearchConfig::SKIP_LEADING_IMAGES`] `<img>` elements belong
/// to the page chrome and are skipped whether or not they carry a source.
/// Elements without a usable source are dropped.
pub fn extract_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    document
        .select(&IMG)
        .skip(SearchConfig::SKIP_LEADING_IMAGES)
        .filter_map(|img| {
            let element = img.value();
            [element.attr("src"), element.attr("data-src")]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(|source| Candidate {
                    source: source.to_string(),
                })
        })
        .collect()
}
