use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// One line of `issues.jsonl`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawIssueRecord")]
pub struct IssueRecord {
    pub title: String,
    pub okr: Option<String>,
    pub story_points: Option<f64>,
    pub estimate: Option<f64>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub epic_link: Option<String>,
}

/// Both key spellings may appear on one line. The snake_case value wins
/// unless it is absent or blank.
#[derive(Deserialize)]
struct RawIssueRecord {
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    okr: Option<String>,
    #[serde(default, rename = "OKR", deserialize_with = "lenient_string")]
    okr_display: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    story_points: Option<f64>,
    #[serde(default, rename = "Story Points", deserialize_with = "lenient_number")]
    story_points_display: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    estimate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    start_date: Option<String>,
    #[serde(default, rename = "Start Date", deserialize_with = "lenient_string")]
    start_date_display: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    due_date: Option<String>,
    #[serde(default, rename = "Due Date", deserialize_with = "lenient_string")]
    due_date_display: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    epic_link: Option<String>,
    #[serde(default, rename = "Epic Link", deserialize_with = "lenient_string")]
    epic_link_display: Option<String>,
}

impl From<RawIssueRecord> for IssueRecord {
    fn from(raw: RawIssueRecord) -> Self {
        Self {
            title: raw.title,
            okr: raw.okr.or(raw.okr_display),
            story_points: raw.story_points.or(raw.story_points_display),
            estimate: raw.estimate,
            start_date: raw.start_date.or(raw.start_date_display),
            due_date: raw.due_date.or(raw.due_date_display),
            epic_link: raw.epic_link.or(raw.epic_link_display),
        }
    }
}

impl IssueRecord {
    /// Story points, falling back to the estimate.
    pub fn points(&self) -> Option<f64> {
        self.story_points.or(self.estimate)
    }

    /// Values destined for board fields, keyed by field name. Story points are
    /// pushed as whole numbers.
    pub fn field_updates(&self) -> Vec<(&'static str, String)> {
        let mut updates = Vec::new();
        if let Some(okr) = &self.okr {
            updates.push(("OKR", okr.clone()));
        }
        if let Some(points) = self.points() {
            updates.push(("Story Points", format!("{}", points.trunc() as i64)));
        }
        if let Some(start) = &self.start_date {
            updates.push(("Start Date", start.clone()));
        }
        if let Some(due) = &self.due_date {
            updates.push(("Due Date", due.clone()));
        }
        updates
    }
}

/// Strings and numbers become strings; null and blank become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numbers and numeric strings become numbers; anything else is `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Read every non-blank line of a JSONL file. Malformed lines are an error
/// naming the line number.
pub fn load_issue_records(path: &Path) -> Result<Vec<IssueRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("{}:{}: invalid issue record", path.display(), idx + 1))
        })
        .collect()
}

/// Records keyed by title. A repeated title keeps the last record.
pub fn index_by_title(records: Vec<IssueRecord>) -> HashMap<String, IssueRecord> {
    records
        .into_iter()
        .filter(|r| !r.title.is_empty())
        .map(|r| (r.title.clone(), r))
        .collect()
}
