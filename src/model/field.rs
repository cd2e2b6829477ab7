use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// ProjectV2 field data types, as the GraphQL API spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    Text,
    Number,
    Date,
    SingleSelect,
    Iteration,
    ParentIssue,
    #[serde(other)]
    Other,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDataType::Text => "TEXT",
            FieldDataType::Number => "NUMBER",
            FieldDataType::Date => "DATE",
            FieldDataType::SingleSelect => "SINGLE_SELECT",
            FieldDataType::Iteration => "ITERATION",
            FieldDataType::ParentIssue => "PARENT_ISSUE",
            FieldDataType::Other => "OTHER",
        }
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-select option in the config: a bare name or a full definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OptionSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

impl OptionSpec {
    pub fn name(&self) -> &str {
        match self {
            OptionSpec::Name(name) | OptionSpec::Full { name, .. } => name,
        }
    }

    /// Option color, upper-cased for the API. Defaults to gray.
    pub fn color(&self) -> String {
        match self {
            OptionSpec::Full {
                color: Some(color), ..
            } if !color.trim().is_empty() => color.trim().to_uppercase(),
            _ => "GRAY".to_string(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            OptionSpec::Full {
                description: Some(d),
                ..
            } => d,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IterationSettings {
    #[serde(default = "default_duration_weeks")]
    pub duration_weeks: u32,
    #[serde(default)]
    pub start_day_of_week: Option<String>,
}

fn default_duration_weeks() -> u32 {
    2
}

impl Default for IterationSettings {
    fn default() -> Self {
        Self {
            duration_weeks: default_duration_weeks(),
            start_day_of_week: None,
        }
    }
}

impl IterationSettings {
    /// Only the first three letters count, so "Mon", "MONDAY" and "monday" agree.
    /// Anything unrecognised falls back to Monday.
    pub fn start_day(&self) -> Weekday {
        self.start_day_of_week
            .as_deref()
            .and_then(|day| day.trim().get(..3))
            .and_then(|prefix| prefix.parse::<Weekday>().ok())
            .unwrap_or(Weekday::Mon)
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_weeks * 7
    }
}

/// A custom field we want on the board, from `project_config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Option<IterationSettings>,
}

impl FieldSpec {
    /// Map the config's type tag to a creatable data type.
    pub fn data_type(&self) -> Option<FieldDataType> {
        match self.kind.trim().to_lowercase().as_str() {
            "single-select" | "single_select" => Some(FieldDataType::SingleSelect),
            "iteration" => Some(FieldDataType::Iteration),
            "number" => Some(FieldDataType::Number),
            "text" => Some(FieldDataType::Text),
            "date" => Some(FieldDataType::Date),
            _ => None,
        }
    }

    pub fn iteration(&self) -> IterationSettings {
        self.config.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectSection {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

pub fn load_project_config(path: &Path) -> Result<ProjectConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project config from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse project config in {}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub id: String,
    pub name: String,
}

/// A field that exists on a board.
#[derive(Debug, Clone)]
pub struct ProjectField {
    pub id: String,
    pub name: String,
    pub data_type: FieldDataType,
    pub options: Vec<SelectOption>,
}

impl ProjectField {
    pub fn option_id(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(wanted))
            .map(|o| o.id.as_str())
    }
}
