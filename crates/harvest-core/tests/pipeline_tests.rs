//! End-to-end tests for the entity loop with a scripted browser and fetcher.

use async_trait::async_trait;
use harvest_core::{
    identify, run_entities, BrowserDriver, BrowserLauncher, EntityMapping, EntityOutcome,
    EntityPipeline, FetchedBody, HarvestConfig, HarvestError, ImageFetcher, Result,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A results page: three chrome images followed by the given sources.
fn results_page(sources: &[&str]) -> String {
    let mut html = String::from(
        r#"<html><body><img src="/chrome/a.png"><img src="/chrome/b.png"><img src="/chrome/c.png">"#,
    );
    for source in sources {
        html.push_str(&format!(r#"<div><img data-src="{}"></div>"#, source));
    }
    html.push_str("</body></html>");
    html
}

struct FakeDriver {
    page: String,
    quits: Arc<AtomicU32>,
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn goto(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn click(&self, _css_selector: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn page_height(&self) -> Result<u64> {
        Ok(4000)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page.clone())
    }

    async fn quit(&self) -> Result<()> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves the same page to every session; launches listed in `failures`
/// (0-based) fail.
struct FakeLauncher {
    page: String,
    failures: Vec<u32>,
    launches: AtomicU32,
    quits: Arc<AtomicU32>,
}

impl FakeLauncher {
    fn new(page: String) -> Self {
        Self {
            page,
            failures: Vec::new(),
            launches: AtomicU32::new(0),
            quits: Arc::new(AtomicU32::new(0)),
        }
    }

    fn failing_on(mut self, launches: &[u32]) -> Self {
        self.failures = launches.to_vec();
        self
    }

    fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self) -> Result<FakeDriver> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        if self.failures.contains(&n) {
            return Err(HarvestError::session("chrome failed to start"));
        }
        Ok(FakeDriver {
            page: self.page.clone(),
            quits: self.quits.clone(),
        })
    }
}

#[derive(Default)]
struct FakeFetcher {
    bodies: HashMap<String, usize>,
    /// URLs whose first fetch answers 503.
    unavailable_once: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn serving(bodies: &[(&str, usize)]) -> Self {
        Self {
            bodies: bodies.iter().map(|(u, n)| (u.to_string(), *n)).collect(),
            ..Self::default()
        }
    }

    fn unavailable_once(self, url: &str) -> Self {
        self.unavailable_once.lock().unwrap().push(url.to_string());
        self
    }

    fn fetches_of(&self, url: &str) -> usize {
        self.fetched.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn content_type(&self, _url: &str) -> Result<Option<String>> {
        Ok(Some("image/jpeg".to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        self.fetched.lock().unwrap().push(url.to_string());
        let mut unavailable = self.unavailable_once.lock().unwrap();
        if let Some(pos) = unavailable.iter().position(|u| u == url) {
            unavailable.remove(pos);
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: 503,
            });
        }
        drop(unavailable);
        match self.bodies.get(url) {
            Some(len) => Ok(FetchedBody {
                bytes: vec![0xFF; *len],
                content_type: Some("image/jpeg".to_string()),
            }),
            None => Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn config(save_dir: &Path, target: i64) -> HarvestConfig {
    HarvestConfig {
        save_dir: save_dir.to_path_buf(),
        target_count: target,
        settle_delay_ms: 0,
        ..HarvestConfig::default()
    }
}

fn entities(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_acquires_up_to_quota() {
    let temp_dir = TempDir::new().unwrap();
    let page = results_page(&[
        "https://cdn.example/1.jpg",
        "https://cdn.example/logo.png",
        "https://cdn.example/2.jpg",
        "https://cdn.example/3.jpg",
    ]);
    let fetcher = FakeFetcher::serving(&[
        ("https://cdn.example/1.jpg", 2000),
        ("https://cdn.example/2.jpg", 2000),
        ("https://cdn.example/3.jpg", 2000),
    ]);
    let pipeline =
        EntityPipeline::new(config(temp_dir.path(), 2), FakeLauncher::new(page), fetcher).unwrap();

    let report = run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    assert!(matches!(
        report.outcome("fox"),
        Some(EntityOutcome::Acquired {
            acquired: 2,
            requested: 2
        })
    ));
    let dir = temp_dir.path().join("fox");
    assert_eq!(file_names(&dir), vec!["fox_0.jpeg", "fox_1.jpeg"]);

    let mapping = pipeline.store().load("fox").unwrap();
    assert_eq!(mapping.len(), 2);
    assert_eq!(
        mapping.get(&identify("https://cdn.example/1.jpg")),
        Some("fox_0.jpeg")
    );
    assert_eq!(
        mapping.get(&identify("https://cdn.example/2.jpg")),
        Some("fox_1.jpeg")
    );
    assert_eq!(pipeline.launcher().quits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_known_identifier_is_not_fetched_again() {
    let temp_dir = TempDir::new().unwrap();
    let page = results_page(&["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"]);
    let fetcher = FakeFetcher::serving(&[
        ("https://cdn.example/1.jpg", 2000),
        ("https://cdn.example/2.jpg", 2000),
    ]);
    let pipeline =
        EntityPipeline::new(config(temp_dir.path(), 1), FakeLauncher::new(page), fetcher).unwrap();

    let known: EntityMapping = [(identify("https://cdn.example/1.jpg"), "gone.jpeg")]
        .into_iter()
        .collect();
    pipeline.store().save("fox", &known).unwrap();

    run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    let dir = temp_dir.path().join("fox");
    assert_eq!(file_names(&dir), vec!["fox_0.jpeg"]);
    let mapping = pipeline.store().load("fox").unwrap();
    assert_eq!(mapping.len(), 2);
    assert_eq!(
        mapping.get(&identify("https://cdn.example/2.jpg")),
        Some("fox_0.jpeg")
    );
}

#[tokio::test]
async fn test_transient_fetch_failure_is_retried_next_round() {
    let temp_dir = TempDir::new().unwrap();
    let page = results_page(&["https://cdn.example/1.jpg", "https://cdn.example/thumb.jpg"]);
    let fetcher = FakeFetcher::serving(&[
        ("https://cdn.example/1.jpg", 2000),
        ("https://cdn.example/thumb.jpg", 800),
    ])
    .unavailable_once("https://cdn.example/1.jpg");
    let pipeline =
        EntityPipeline::new(config(temp_dir.path(), 1), FakeLauncher::new(page), fetcher).unwrap();

    let report = run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    assert!(matches!(
        report.outcome("fox"),
        Some(EntityOutcome::Acquired {
            acquired: 1,
            requested: 1
        })
    ));
    assert_eq!(file_names(&temp_dir.path().join("fox")), vec!["fox_0.jpeg"]);
    assert_eq!(pipeline.fetcher().fetches_of("https://cdn.example/1.jpg"), 2);
    // Too small is settled after the first round.
    assert_eq!(
        pipeline.fetcher().fetches_of("https://cdn.example/thumb.jpg"),
        1
    );
}

#[tokio::test]
async fn test_undersized_images_are_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let page = results_page(&["https://cdn.example/thumb.jpg"]);
    let fetcher = FakeFetcher::serving(&[("https://cdn.example/thumb.jpg", 800)]);
    let pipeline =
        EntityPipeline::new(config(temp_dir.path(), 1), FakeLauncher::new(page), fetcher).unwrap();

    let report = run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    assert!(matches!(
        report.outcome("fox"),
        Some(EntityOutcome::Acquired {
            acquired: 0,
            requested: 1
        })
    ));
    assert!(file_names(&temp_dir.path().join("fox")).is_empty());
    assert!(pipeline.store().load("fox").unwrap().is_empty());
}

#[tokio::test]
async fn test_over_quota_directory_is_pruned() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("fox");
    fs::create_dir_all(&dir).unwrap();

    let base = SystemTime::now() - Duration::from_secs(3600);
    let mut mapping = EntityMapping::new();
    for i in 0..5u64 {
        let name = format!("fox_{}.jpeg", i);
        let path = dir.join(&name);
        fs::write(&path, b"image").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(base + Duration::from_secs(60 * i))
            .unwrap();
        mapping.insert(format!("h{}", i), name);
    }

    let pipeline = EntityPipeline::new(
        config(temp_dir.path(), 3),
        FakeLauncher::new(String::new()),
        FakeFetcher::default(),
    )
    .unwrap();
    pipeline.store().save("fox", &mapping).unwrap();

    let report = run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    assert!(matches!(
        report.outcome("fox"),
        Some(EntityOutcome::Pruned { removed: 2 })
    ));
    assert_eq!(
        file_names(&dir),
        vec!["fox_0.jpeg", "fox_1.jpeg", "fox_2.jpeg"]
    );
    let mapping = pipeline.store().load("fox").unwrap();
    assert_eq!(mapping.len(), 3);
    assert!(!mapping.contains_identifier("h3"));
    assert!(!mapping.contains_identifier("h4"));
    assert_eq!(pipeline.launcher().launches(), 0);
}

#[tokio::test]
async fn test_at_quota_launches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("fox");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("fox_0.jpeg"), b"image").unwrap();

    let pipeline = EntityPipeline::new(
        config(temp_dir.path(), 1),
        FakeLauncher::new(String::new()),
        FakeFetcher::default(),
    )
    .unwrap();

    let report = run_entities(&pipeline, &entities(&["fox"])).await.unwrap();

    assert!(matches!(report.outcome("fox"), Some(EntityOutcome::AtQuota)));
    assert_eq!(pipeline.launcher().launches(), 0);
}

#[tokio::test]
async fn test_empty_entity_list() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = EntityPipeline::new(
        config(temp_dir.path(), 5),
        FakeLauncher::new(String::new()),
        FakeFetcher::default(),
    )
    .unwrap();

    let report = run_entities(&pipeline, &[]).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(pipeline.launcher().launches(), 0);
}

#[tokio::test]
async fn test_session_failure_does_not_stop_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let page = results_page(&["https://cdn.example/1.jpg"]);
    let fetcher = FakeFetcher::serving(&[("https://cdn.example/1.jpg", 2000)]);
    let launcher = FakeLauncher::new(page).failing_on(&[0]);
    let pipeline = EntityPipeline::new(config(temp_dir.path(), 1), launcher, fetcher).unwrap();

    let report = run_entities(&pipeline, &entities(&["lynx", "fox"]))
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    assert!(matches!(
        report.outcome("lynx"),
        Some(EntityOutcome::Failed {
            error: HarvestError::Session { .. }
        })
    ));
    assert!(matches!(
        report.outcome("fox"),
        Some(EntityOutcome::Acquired { acquired: 1, .. })
    ));
    assert_eq!(report.failed(), 1);
    assert_eq!(file_names(&temp_dir.path().join("fox")), vec!["fox_0.jpeg"]);
}

#[tokio::test]
async fn test_malformed_store_aborts_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = EntityPipeline::new(
        config(temp_dir.path(), 1),
        FakeLauncher::new(results_page(&[])),
        FakeFetcher::default(),
    )
    .unwrap();
    fs::write(pipeline.store().path(), "{ not json").unwrap();

    let result = run_entities(&pipeline, &entities(&["fox", "lynx"])).await;

    assert!(matches!(result, Err(HarvestError::MalformedStore { .. })));
    assert_eq!(pipeline.launcher().launches(), 0);
    assert!(!temp_dir.path().join("lynx").exists());
}
