use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_LABELS: &str = include_str!("defaults/labels.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    /// Hex color, with or without a leading `#`.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LabelSpec {
    /// Color as GitHub expects it: bare hex, no `#`.
    pub fn color(&self) -> &str {
        self.color.trim_start_matches('#')
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

#[derive(Deserialize)]
struct LabelFile {
    labels: Vec<LabelSpec>,
}

/// The label set every roadmap repository starts with.
pub fn default_labels() -> Result<Vec<LabelSpec>> {
    let file: LabelFile =
        toml::from_str(DEFAULT_LABELS).context("Failed to parse built-in label list")?;
    Ok(file.labels)
}

/// Load a replacement label list from a JSON array.
pub fn load_labels(path: &Path) -> Result<Vec<LabelSpec>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse labels in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_labels_parse() {
        let labels = default_labels().unwrap();
        assert_eq!(labels.len(), 16);
        assert_eq!(labels[0].name, "priority:high");
        assert_eq!(labels[0].description(), Some("High impact/urgent"));
        assert_eq!(labels[1].description(), None);
    }

    #[test]
    fn color_strips_hash() {
        let label = LabelSpec {
            name: "x".into(),
            color: "#b60205".into(),
            description: None,
        };
        assert_eq!(label.color(), "b60205");
    }

    #[test]
    fn empty_description_counts_as_absent() {
        let label = LabelSpec {
            name: "x".into(),
            color: "fff".into(),
            description: Some(String::new()),
        };
        assert_eq!(label.description(), None);
    }

    #[test]
    fn load_labels_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(
            &path,
            r##"[{"name":"team:web","color":"#123456"},{"name":"team:api","color":"abcdef","description":"API"}]"##,
        )
        .unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].color(), "123456");
        assert_eq!(labels[1].description(), Some("API"));
    }
}
