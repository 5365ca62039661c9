//! Harvest CLI - runs image acquisition over an entity list.
//!
//! `harvest run` tops up or trims every entity directory to the configured
//! quota. `harvest audit` lists directories whose file count is off target.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_core::{
    audit_quotas, load_entities, run_entities, EntityPipeline, HarvestConfig, HttpClient,
    WebDriverLauncher,
};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Quota-bounded image acquisition per named entity")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring every entity directory to the target count
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Line-delimited entity list
        #[arg(long)]
        entities: Option<PathBuf>,

        /// WebDriver endpoint (chromedriver, selenium)
        #[arg(long)]
        webdriver_url: Option<String>,
    },
    /// List entity directories whose file count differs from the target
    Audit {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Configuration file (defaults to ./config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base directory for entity images and the mapping store
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Target image count per entity
    #[arg(long)]
    target: Option<i64>,
}

impl ConfigArgs {
    fn load(&self) -> Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG).exists() => {
                HarvestConfig::load(Path::new(DEFAULT_CONFIG))?
            }
            None => {
                info!("No {} found, using defaults", DEFAULT_CONFIG);
                HarvestConfig::default()
            }
        };

        if let Some(save_dir) = &self.save_dir {
            config.save_dir = save_dir.clone();
        }
        if let Some(target) = self.target {
            config.target_count = target;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.command {
        Command::Run {
            config,
            entities,
            webdriver_url,
        } => {
            let mut config = config.load()?;
            if let Some(path) = entities {
                config.entities_path = path;
            }
            if let Some(url) = webdriver_url {
                config.webdriver_url = url;
            }
            run(config).await
        }
        Command::Audit { config } => audit(&config.load()?),
    }
}

async fn run(config: HarvestConfig) -> Result<()> {
    let entities = load_entities(&config.entities_path)
        .with_context(|| format!("Failed to read {}", config.entities_path.display()))?;
    info!(
        "Processing {} entities into {} (target {})",
        entities.len(),
        config.save_dir.display(),
        config.target_count
    );

    let launcher = WebDriverLauncher::new(config.webdriver_url.clone());
    let fetcher = HttpClient::new(config.max_image_bytes)?;
    let pipeline = EntityPipeline::new(config, launcher, fetcher)?;

    let report = run_entities(&pipeline, &entities).await?;
    info!(
        "Done: {} images acquired, {} of {} entities failed",
        report.acquired(),
        report.failed(),
        report.len()
    );
    Ok(())
}

fn audit(config: &HarvestConfig) -> Result<()> {
    let target = usize::try_from(config.target_count)?;
    let shortfalls = audit_quotas(&config.save_dir, target)?;

    if shortfalls.is_empty() {
        info!("All folders have {} images", target);
        return Ok(());
    }
    for shortfall in &shortfalls {
        println!(
            "{}: {}/{}",
            shortfall.entity, shortfall.current, shortfall.target
        );
    }
    info!("{} folders are not at quota", shortfalls.len());
    Ok(())
}
