//! Browser automation for image search.
//!
//! This module provides:
//! - A driver abstraction over the handful of browser primitives the search needs
//! - A WebDriver backend for headless Chrome
//! - The search session state machine (consent, scrolling, stall detection)
//! - Candidate extraction from the rendered results page

mod candidates;
mod controller;
mod driver;
mod webdriver;

pub use candidates::{extract_candidates, Candidate};
pub use controller::{ConsentOutcome, ScrollRound, SearchController, SessionPhase};
pub use driver::{BrowserDriver, BrowserLauncher};
pub use webdriver::{chrome_args, WebDriverLauncher, WebDriverSession};
