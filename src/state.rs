use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{ApplySummary, ConvergenceResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State Structures
// ============================================================================

/// Outcome of the most recent apply, kept for `rollout status`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApplyRecord {
    /// When the pass finished
    pub finished_at: DateTime<Utc>,

    /// Cluster target the pass ran against (`local` or `remote`)
    pub target: String,

    /// Whether commands were only rendered
    #[serde(default)]
    pub dry_run: bool,

    /// Counts per final state
    pub summary: ApplySummary,

    /// Per-node reports in submission order
    pub result: ConvergenceResult,
}

// ============================================================================
// ApplyRecord Implementation
// ============================================================================

impl ApplyRecord {
    pub fn new(target: &str, dry_run: bool, result: ConvergenceResult) -> Self {
        Self {
            finished_at: Utc::now(),
            target: target.to_string(),
            dry_run,
            summary: result.summary(),
            result,
        }
    }

    /// Get the state directory path (~/.local/state/rollout)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("rollout"))
    }

    /// Get the state file path
    fn state_file() -> Result<PathBuf> {
        Ok(Self::state_dir()?.join("last-apply.toml"))
    }

    /// Load the last record, or `None` if no apply has run yet
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&Self::state_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("State file does not exist, no apply recorded");
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let mut record: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        record.result.reindex();

        log::debug!("Loaded state from {}", path.display());
        Ok(Some(record))
    }

    /// Save the record to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::state_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}
