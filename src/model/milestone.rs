use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_MILESTONES: &str = include_str!("defaults/milestones.toml");

/// A milestone as we want it to exist. Serializes directly into the REST payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSpec {
    pub title: String,
    /// Left out of the payload when absent, so an update keeps the existing text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_on: DateTime<Utc>,
}

/// A milestone as the platform reports it. `number` is what PATCH needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingMilestone {
    pub number: u64,
    pub title: String,
}

#[derive(Deserialize)]
struct MilestoneFile {
    milestones: Vec<MilestoneSpec>,
}

pub fn default_milestones() -> Result<Vec<MilestoneSpec>> {
    let file: MilestoneFile =
        toml::from_str(DEFAULT_MILESTONES).context("Failed to parse built-in milestone list")?;
    Ok(file.milestones)
}

/// Load a replacement milestone list from a JSON array.
pub fn load_milestones(path: &Path) -> Result<Vec<MilestoneSpec>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read milestones from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse milestones in {}", path.display()))
}
