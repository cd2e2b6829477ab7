use std::collections::{HashMap, HashSet};
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::github::{FieldInput, ProjectsApi};
use crate::matcher::is_epic_title;
use crate::model::field::{FieldDataType, ProjectField};
use crate::model::issue_record::IssueRecord;
use crate::util::pacing::Pacing;

pub const PARENT_ISSUE_FIELD: &str = "Parent issue";
pub const TRACKED_FIELDS: [&str; 5] = ["OKR", "Story Points", "Start Date", "Due Date", PARENT_ISSUE_FIELD];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Items with at least one field written.
    pub updated_items: usize,
    pub updated_values: usize,
    pub failed_values: usize,
    /// Items whose parent still has to be set by hand.
    pub parents_pending: usize,
    pub skipped: usize,
}

/// Convert a raw record value for `field`, by the field's data type.
pub fn field_input(field: &ProjectField, raw: &str) -> Result<FieldInput, String> {
    let raw = raw.trim();
    match field.data_type {
        FieldDataType::Text => Ok(FieldInput::Text(raw.to_string())),
        FieldDataType::Number => raw
            .parse::<f64>()
            .map(FieldInput::Number)
            .map_err(|_| format!("'{raw}' is not a number")),
        FieldDataType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(FieldInput::Date)
            .map_err(|_| format!("'{raw}' is not a YYYY-MM-DD date")),
        FieldDataType::SingleSelect => field
            .option_id(raw)
            .map(|id| FieldInput::SingleSelect(id.to_string()))
            .ok_or_else(|| format!("'{raw}' is not an option of {}", field.name)),
        other => Err(format!("{other} fields cannot be set")),
    }
}

/// Push OKR, story points and dates from `issues.jsonl` onto the board items
/// with the same titles.
pub async fn update_fields<A, W>(
    api: &A,
    owner: &str,
    project_number: u64,
    records: &HashMap<String, IssueRecord>,
    pacing: Pacing,
    out: &mut W,
) -> Result<UpdateSummary>
where
    A: ProjectsApi + ?Sized,
    W: Write,
{
    let project = api
        .project(owner, project_number)
        .await
        .with_context(|| format!("Failed to resolve project #{project_number} for {owner}"))?;
    writeln!(out, "Found project: {} (ID: {})", project.title, project.id)?;

    let board_fields = api
        .fields(&project.id)
        .await
        .context("Failed to fetch project fields")?;
    let fields: HashMap<&str, &ProjectField> = board_fields
        .iter()
        .filter(|f| TRACKED_FIELDS.contains(&f.name.as_str()))
        .map(|f| (f.name.as_str(), f))
        .collect();
    writeln!(out, "Found fields: {}", fields.len())?;

    let missing: Vec<&str> = TRACKED_FIELDS
        .iter()
        .copied()
        .filter(|name| !fields.contains_key(name))
        .collect();
    if !missing.is_empty() {
        let available: Vec<&str> = board_fields.iter().map(|f| f.name.as_str()).collect();
        writeln!(out, "⚠ Missing fields: {}", missing.join(", "))?;
        writeln!(out, "  Available fields: {}", available.join(", "))?;
    }

    let items = api
        .items(&project.id)
        .await
        .context("Failed to fetch project items")?;
    writeln!(out, "Found {} items", items.len())?;
    writeln!(out)?;

    let mut summary = UpdateSummary::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for item in &items {
        let Some(title) = item.title() else {
            summary.skipped += 1;
            continue;
        };
        if is_epic_title(title) {
            summary.skipped += 1;
            continue;
        }
        let Some(record) = records.get(title) else {
            tracing::debug!(title, "no issue record for item");
            summary.skipped += 1;
            continue;
        };
        if !seen.insert(title) {
            tracing::warn!(title, "repeated title on board, updating the first item only");
            summary.skipped += 1;
            continue;
        }

        writeln!(out, "Updating: {title}")?;
        let mut wrote_any = false;
        for (name, raw) in record.field_updates() {
            let Some(field) = fields.get(name) else {
                continue;
            };
            let input = match field_input(field, &raw) {
                Ok(input) => input,
                Err(reason) => {
                    writeln!(out, "  ✗ Failed to update {name}: {reason}")?;
                    summary.failed_values += 1;
                    continue;
                }
            };
            match api.set_field_value(&project.id, &item.id, &field.id, &input).await {
                Ok(()) => {
                    writeln!(out, "  ✓ {name}: {raw}")?;
                    summary.updated_values += 1;
                    wrote_any = true;
                }
                Err(e) => {
                    writeln!(out, "  ✗ Failed to update {name}: {e}")?;
                    summary.failed_values += 1;
                }
            }
            pacing.pause().await;
        }

        if let Some(link) = &record.epic_link {
            if fields.contains_key(PARENT_ISSUE_FIELD) {
                writeln!(out, "  ℹ Parent Epic: {link}")?;
                writeln!(out, "    Set the parent manually or run `boardops link`")?;
                summary.parents_pending += 1;
            }
        }
        if wrote_any {
            summary.updated_items += 1;
        }
        writeln!(out)?;
    }

    writeln!(
        out,
        "Done! Updated {} items ({} values, {} failed).",
        summary.updated_items, summary.updated_values, summary.failed_values
    )?;
    if summary.parents_pending > 0 {
        writeln!(
            out,
            "ℹ {} items still need their parent issue set.",
            summary.parents_pending
        )?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::tests::{draft_item, issue_item, Call, RecordingApi};
    use crate::model::field::SelectOption;
    use crate::model::issue_record::index_by_title;

    fn field(id: &str, name: &str, data_type: FieldDataType) -> ProjectField {
        ProjectField {
            id: id.into(),
            name: name.into(),
            data_type,
            options: vec![],
        }
    }

    fn board_fields() -> Vec<ProjectField> {
        vec![
            field("F_okr", "OKR", FieldDataType::Text),
            field("F_sp", "Story Points", FieldDataType::Number),
            field("F_start", "Start Date", FieldDataType::Date),
            field("F_due", "Due Date", FieldDataType::Date),
            field("F_parent", "Parent issue", FieldDataType::ParentIssue),
            field("F_status", "Status", FieldDataType::SingleSelect),
        ]
    }

    fn records(lines: &[&str]) -> HashMap<String, IssueRecord> {
        index_by_title(
            lines
                .iter()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect(),
        )
    }

    #[test]
    fn inputs_follow_field_type() {
        let fields = board_fields();
        assert_eq!(
            field_input(&fields[0], "O1-KR2"),
            Ok(FieldInput::Text("O1-KR2".into()))
        );
        assert_eq!(field_input(&fields[1], "5"), Ok(FieldInput::Number(5.0)));
        assert!(field_input(&fields[1], "five").is_err());
        assert_eq!(
            field_input(&fields[2], "2025-11-03"),
            Ok(FieldInput::Date(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()))
        );
        assert!(field_input(&fields[2], "03/11/2025").is_err());
        assert!(field_input(&fields[4], "anything").is_err());
    }

    #[test]
    fn single_select_resolves_option_by_name() {
        let mut status = field("F_status", "Status", FieldDataType::SingleSelect);
        status.options = vec![SelectOption {
            id: "opt_todo".into(),
            name: "Todo".into(),
        }];
        assert_eq!(
            field_input(&status, "todo"),
            Ok(FieldInput::SingleSelect("opt_todo".into()))
        );
        assert!(field_input(&status, "Done").is_err());
    }

    #[tokio::test]
    async fn writes_record_values_onto_matching_items() {
        let api = RecordingApi::new()
            .with_project(17, "PVT_17", "Roadmap")
            .with_fields(board_fields())
            .with_items(
                "PVT_17",
                vec![
                    issue_item("a", 1, "Invite teammates"),
                    issue_item("e", 2, "EPIC: Onboarding"),
                    issue_item("u", 3, "Not in file"),
                    draft_item("d", "Invite teammates"),
                ],
            );
        let records = records(&[
            r#"{"title": "Invite teammates", "OKR": "O1", "estimate": 3.7, "Start Date": "2025-11-03", "Epic Link": "EPIC: Onboarding"}"#,
            r#"{"title": "EPIC: Onboarding", "okr": "O1"}"#,
        ]);

        let mut out = Vec::new();
        let summary = update_fields(&api, "acme", 17, &records, Pacing::none(), &mut out)
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            vec![
                Call::SetFieldValue {
                    item: "PVTI_a".into(),
                    field: "F_okr".into(),
                    value: FieldInput::Text("O1".into())
                },
                Call::SetFieldValue {
                    item: "PVTI_a".into(),
                    field: "F_sp".into(),
                    value: FieldInput::Number(3.0)
                },
                Call::SetFieldValue {
                    item: "PVTI_a".into(),
                    field: "F_start".into(),
                    value: FieldInput::Date(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap())
                },
            ]
        );
        assert_eq!(summary.updated_items, 1);
        assert_eq!(summary.updated_values, 3);
        assert_eq!(summary.parents_pending, 1);
        assert_eq!(summary.skipped, 3);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Parent Epic: EPIC: Onboarding"));
        assert!(!out.contains("Missing fields"));
    }

    #[tokio::test]
    async fn missing_fields_are_reported_with_available_names() {
        let api = RecordingApi::new()
            .with_project(17, "PVT_17", "Roadmap")
            .with_fields(vec![
                field("F_okr", "OKR", FieldDataType::Text),
                field("F_status", "Status", FieldDataType::SingleSelect),
            ])
            .with_items("PVT_17", vec![issue_item("a", 1, "Invite teammates")]);
        let records = records(&[r#"{"title": "Invite teammates", "OKR": "O2", "Due Date": "2025-12-01"}"#]);

        let mut out = Vec::new();
        let summary = update_fields(&api, "acme", 17, &records, Pacing::none(), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("⚠ Missing fields: Story Points, Start Date, Due Date, Parent issue"));
        assert!(out.contains("Available fields: OKR, Status"));
        assert_eq!(summary.updated_values, 1);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn bad_values_fail_only_that_update() {
        let api = RecordingApi::new()
            .with_project(17, "PVT_17", "Roadmap")
            .with_fields(board_fields())
            .with_items("PVT_17", vec![issue_item("a", 1, "Invite teammates")]);
        let records = records(&[r#"{"title": "Invite teammates", "OKR": "O1", "Due Date": "next week"}"#]);

        let mut out = Vec::new();
        let summary = update_fields(&api, "acme", 17, &records, Pacing::none(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.updated_values, 1);
        assert_eq!(summary.failed_values, 1);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("✗ Failed to update Due Date: 'next week' is not a YYYY-MM-DD date"));
    }
}
