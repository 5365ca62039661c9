//! Search session state machine.
//!
//! `Init → NavigatingToSearch → AwaitingConsent → Scrolling → Done`
//!
//! The controller loads the results page, tries to dismiss the consent
//! dialog a bounded number of times, then scrolls one round at a time.
//! Each round yields the page's candidates minus those the caller has
//! marked as settled with [`SearchController::mark_seen`]. The
//! session is done once the page height has not changed for
//! [`SearchConfig::STALL_LIMIT`] consecutive rounds, or the round budget is
//! spent. Callers stop early by simply not asking for another round.

use crate::browser::candidates::{extract_candidates, Candidate};
use crate::browser::driver::BrowserDriver;
use crate::config::SearchConfig;
use crate::network::{retry_or_fallback, RetryPolicy};
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    NavigatingToSearch,
    AwaitingConsent,
    Scrolling,
    Done,
}

/// Result of the consent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Dismissed,
    /// Attempts exhausted; the session continues with whatever the page shows.
    NotFound,
}

/// One scroll round.
#[derive(Debug, Clone)]
pub struct ScrollRound {
    /// 1-based round number.
    pub index: u32,
    /// Unsettled candidates on the page, in DOM order, without repeats.
    pub candidates: Vec<Candidate>,
    /// The page height did not change during this round.
    pub stalled: bool,
}

enum ConsentError {
    Navigation(HarvestError),
    Missing(HarvestError),
}

impl fmt::Display for ConsentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentError::Navigation(e) => write!(f, "navigation failed: {}", e),
            ConsentError::Missing(e) => write!(f, "accept button not found: {}", e),
        }
    }
}

/// Drives one browser session through a search.
pub struct SearchController<D> {
    driver: D,
    phase: SessionPhase,
    settle_delay: Duration,
    consent_wait: Duration,
    consent_policy: RetryPolicy,
    stall_limit: u32,
    max_rounds: u32,
    rounds: u32,
    stalls: u32,
    last_height: u64,
    seen: HashSet<String>,
}

impl<D: BrowserDriver> SearchController<D> {
    pub fn new(driver: D, settle_delay: Duration, max_rounds: u32) -> Self {
        Self {
            driver,
            phase: SessionPhase::Init,
            settle_delay,
            consent_wait: SearchConfig::CONSENT_WAIT,
            consent_policy: RetryPolicy::new()
                .with_max_attempts(SearchConfig::CONSENT_MAX_ATTEMPTS)
                .with_base_delay(SearchConfig::CONSENT_RETRY_DELAY)
                .with_max_delay(SearchConfig::CONSENT_RETRY_DELAY)
                .with_jitter(false),
            stall_limit: SearchConfig::STALL_LIMIT,
            max_rounds,
            rounds: 0,
            stalls: 0,
            last_height: 0,
            seen: HashSet::new(),
        }
    }

    /// Override the consent retry policy and per-attempt wait.
    pub fn with_consent(mut self, policy: RetryPolicy, wait: Duration) -> Self {
        self.consent_policy = policy;
        self.consent_wait = wait;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Navigate to `search_url` and handle the consent dialog.
    ///
    /// A missing consent button is not an error. A navigation failure is.
    pub async fn open(&mut self, search_url: &str) -> Result<ConsentOutcome> {
        if self.phase != SessionPhase::Init {
            return Err(HarvestError::session(format!(
                "Cannot open a search from phase {:?}",
                self.phase
            )));
        }

        self.phase = SessionPhase::NavigatingToSearch;
        debug!("Opening search {}", search_url);

        let driver = &self.driver;
        let wait = self.consent_wait;
        self.phase = SessionPhase::AwaitingConsent;
        let (outcome, stats) = retry_or_fallback(
            &self.consent_policy,
            || async move {
                driver
                    .goto(search_url)
                    .await
                    .map_err(ConsentError::Navigation)?;
                driver
                    .click(SearchConfig::CONSENT_SELECTOR, wait)
                    .await
                    .map_err(ConsentError::Missing)?;
                Ok::<Result<ConsentOutcome>, ConsentError>(Ok(ConsentOutcome::Dismissed))
            },
            |e: &ConsentError| matches!(e, ConsentError::Missing(_)),
            |e: ConsentError| match e {
                ConsentError::Navigation(err) => Err(err),
                ConsentError::Missing(_) => {
                    warn!("Max attempts reached, continuing without clicking the accept button");
                    Ok(ConsentOutcome::NotFound)
                }
            },
        )
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.phase = SessionPhase::Done;
                return Err(e);
            }
        };
        if outcome == ConsentOutcome::Dismissed {
            info!("Clicked on the accept button (attempt {})", stats.attempts);
        }

        self.last_height = self.driver.page_height().await?;
        self.phase = SessionPhase::Scrolling;
        Ok(outcome)
    }

    /// Scroll once and return the newly visible candidates.
    ///
    /// Returns `None` once the session is done.
    pub async fn next_round(&mut self) -> Result<Option<ScrollRound>> {
        if self.phase != SessionPhase::Scrolling {
            return Ok(None);
        }
        if self.stalls >= self.stall_limit || self.rounds >= self.max_rounds {
            debug!(
                "Scrolling finished after {} rounds ({} stalled)",
                self.rounds, self.stalls
            );
            self.phase = SessionPhase::Done;
            return Ok(None);
        }

        self.driver.scroll_to_bottom().await?;
        tokio::time::sleep(self.settle_delay).await;

        let height = self.driver.page_height().await?;
        let stalled = height == self.last_height;
        if stalled {
            self.stalls += 1;
        } else {
            self.stalls = 0;
        }
        self.last_height = height;
        self.rounds += 1;

        let source = self.driver.page_source().await?;
        let mut in_round = HashSet::new();
        let candidates: Vec<Candidate> = extract_candidates(&source)
            .into_iter()
            .filter(|c| !self.seen.contains(&c.source) && in_round.insert(c.source.clone()))
            .collect();

        debug!(
            "Round {}: height {}, {} new candidates{}",
            self.rounds,
            height,
            candidates.len(),
            if stalled { " (stalled)" } else { "" }
        );

        Ok(Some(ScrollRound {
            index: self.rounds,
            candidates,
            stalled,
        }))
    }

    /// Exclude `source` from later rounds.
    ///
    /// Sources that are never marked, such as those whose fetch failed,
    /// are offered again while they remain on the page.
    pub fn mark_seen(&mut self, source: &str) {
        self.seen.insert(source.to_string());
    }

    /// End the browser session.
    pub async fn finish(&mut self) -> Result<()> {
        self.phase = SessionPhase::Done;
        self.driver.quit().await
    }
}
