//! Entity loop driver.

use crate::browser::BrowserLauncher;
use crate::pipeline::{EntityOutcome, EntityPipeline};
use crate::resolver::ImageFetcher;
use crate::{HarvestError, Result};
use std::path::Path;
use tracing::{error, info};

/// Read a line-delimited entity list, one name per non-empty line.
///
/// Names become directory names under the save directory, so a name that
/// would resolve elsewhere rejects the whole list.
pub fn load_entities(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io_with_path(e, path))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| validate_entity_name(name).map(|_| name.to_string()))
        .collect()
}

fn validate_entity_name(name: &str) -> Result<()> {
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(HarvestError::Validation {
            field: "entity".to_string(),
            message: format!("'{}' is not a single directory name", name),
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct EntityReport {
    pub entity: String,
    pub outcome: EntityOutcome,
}

/// Per-entity outcomes of one run, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: Vec<EntityReport>,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcome(&self, entity: &str) -> Option<&EntityOutcome> {
        self.entries
            .iter()
            .find(|e| e.entity == entity)
            .map(|e| &e.outcome)
    }

    /// Images acquired across all entities.
    pub fn acquired(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                EntityOutcome::Acquired { acquired, .. } => acquired,
                _ => 0,
            })
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntityOutcome::Failed { .. }))
            .count()
    }
}

/// Run the pipeline for every entity in order.
///
/// Per-entity failures are recorded and the loop moves on. Only an error
/// that is fatal to the run stops it.
pub async fn run_entities<L, F>(
    pipeline: &EntityPipeline<L, F>,
    entities: &[String],
) -> Result<RunReport>
where
    L: BrowserLauncher,
    F: ImageFetcher,
{
    let total = entities.len();
    let mut report = RunReport::default();

    for (i, entity) in entities.iter().enumerate() {
        info!("({}/{}) Processing {}", i + 1, total, entity);

        let outcome = match pipeline.run(entity).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal_to_run() => {
                error!("Aborting run at {}: {}", entity, e);
                return Err(e);
            }
            Err(e) => EntityOutcome::Failed { error: e },
        };

        match &outcome {
            EntityOutcome::Failed { error } => error!("({}/{}) {}: {}", i + 1, total, entity, error),
            outcome => info!("({}/{}) {}: {}", i + 1, total, entity, outcome),
        }
        report.entries.push(EntityReport {
            entity: entity.clone(),
            outcome,
        });
    }

    info!(
        "Run complete: {} entities, {} images acquired, {} failed",
        report.len(),
        report.acquired(),
        report.failed()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_entities_skips_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entities.txt");
        fs::write(&path, "red fox\n\n  lynx  \r\n\t\nbrown bear").unwrap();

        assert_eq!(
            load_entities(&path).unwrap(),
            vec!["red fox", "lynx", "brown bear"]
        );
    }

    #[test]
    fn test_load_entities_rejects_path_like_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entities.txt");

        for bad in ["a/b", "..", "red\\fox", "/etc"] {
            fs::write(&path, format!("lynx\n{}\n", bad)).unwrap();
            let result = load_entities(&path);
            assert!(
                matches!(result, Err(HarvestError::Validation { ref field, .. }) if field == "entity"),
                "{} was accepted",
                bad
            );
        }

        fs::write(&path, "st. bernard\n...\n").unwrap();
        assert_eq!(load_entities(&path).unwrap(), vec!["st. bernard", "..."]);
    }

    #[test]
    fn test_load_entities_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_entities(&temp_dir.path().join("missing.txt"));
        assert!(matches!(result, Err(HarvestError::Io { path: Some(_), .. })));
    }

    #[test]
    fn test_report_totals() {
        let report = RunReport {
            entries: vec![
                EntityReport {
                    entity: "fox".into(),
                    outcome: EntityOutcome::Acquired {
                        acquired: 4,
                        requested: 5,
                    },
                },
                EntityReport {
                    entity: "lynx".into(),
                    outcome: EntityOutcome::Failed {
                        error: HarvestError::session("crashed"),
                    },
                },
                EntityReport {
                    entity: "bear".into(),
                    outcome: EntityOutcome::AtQuota,
                },
            ],
        };

        assert_eq!(report.len(), 3);
        assert_eq!(report.acquired(), 4);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.outcome("bear"), Some(EntityOutcome::AtQuota)));
        assert!(report.outcome("wolf").is_none());
    }
}
