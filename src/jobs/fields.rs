use std::io::Write;

use anyhow::{Context, Result};

use crate::github::ProjectsApi;
use crate::model::field::FieldSpec;
use crate::util::pacing::Pacing;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldSummary {
    pub created: usize,
    /// Rejected as duplicates; counted as success.
    pub existing: usize,
    pub failed: usize,
}

impl FieldSummary {
    pub fn succeeded(&self) -> usize {
        self.created + self.existing
    }
}

/// Create the configured custom fields on a board.
pub async fn configure_fields<A, W>(
    api: &A,
    owner: &str,
    project_number: u64,
    fields: &[FieldSpec],
    pacing: Pacing,
    out: &mut W,
) -> Result<FieldSummary>
where
    A: ProjectsApi + ?Sized,
    W: Write,
{
    writeln!(out, "Configuring project #{project_number} for {owner}...")?;
    let project = api
        .project(owner, project_number)
        .await
        .with_context(|| format!("Failed to resolve project #{project_number} for {owner}"))?;
    writeln!(out, "Found project: {} (ID: {})", project.title, project.id)?;
    writeln!(out)?;

    let mut summary = FieldSummary::default();
    for field in fields {
        writeln!(out, "Creating field: {} ({})", field.name, field.kind)?;
        if let Some(description) = &field.description {
            tracing::debug!(field = %field.name, %description, "field descriptions are not sent");
        }
        if field.data_type().is_none() {
            writeln!(out, "  ⚠ Unknown field type: {}", field.kind)?;
            summary.failed += 1;
            continue;
        }

        match api.create_field(&project.id, field).await {
            Ok(id) => {
                tracing::debug!(field = %field.name, %id, "field created");
                writeln!(out, "  ✓ Created field: {}", field.name)?;
                summary.created += 1;
            }
            Err(e) if e.is_already_exists() => {
                writeln!(out, "  ⚠ Field '{}' may already exist", field.name)?;
                summary.existing += 1;
            }
            Err(e) => {
                writeln!(out, "  ✗ Error: {e}")?;
                summary.failed += 1;
            }
        }
        pacing.pause().await;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Done! Successfully created {}/{} fields.",
        summary.succeeded(),
        fields.len()
    )?;
    writeln!(
        out,
        "ℹ Views (boards, tables, roadmaps) cannot be created through the API; set them up in the project UI."
    )?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::tests::{Call, RecordingApi};
    use serde_json::json;

    fn specs() -> Vec<FieldSpec> {
        serde_json::from_value(json!([
            {"name": "OKR", "type": "text"},
            {"name": "Priority", "type": "single-select", "options": ["P0", "P1"]},
            {"name": "Layout", "type": "kanban"},
            {"name": "Sprint", "type": "iteration", "config": {"duration_weeks": 2}}
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn creates_known_types_and_skips_unknown() {
        let api = RecordingApi::new().with_project(17, "PVT_17", "Roadmap");
        let mut out = Vec::new();
        let summary = configure_fields(&api, "acme", 17, &specs(), Pacing::none(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.created, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            api.calls(),
            vec![
                Call::CreateField("OKR".into()),
                Call::CreateField("Priority".into()),
                Call::CreateField("Sprint".into()),
            ]
        );
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Found project: Roadmap (ID: PVT_17)"));
        assert!(out.contains("⚠ Unknown field type: kanban"));
        assert!(out.contains("Successfully created 3/4 fields"));
    }

    #[tokio::test]
    async fn duplicate_counts_as_success() {
        let api = RecordingApi::new()
            .with_project(17, "PVT_17", "Roadmap")
            .with_field_error("OKR", "A field with this name already exists")
            .with_field_error("Sprint", "Something else broke");
        let mut out = Vec::new();
        let summary = configure_fields(&api, "acme", 17, &specs(), Pacing::none(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.existing, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 2);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("⚠ Field 'OKR' may already exist"));
        assert!(out.contains("✗ Error: GraphQL error: Something else broke"));
    }

    #[tokio::test]
    async fn unresolvable_project_is_fatal() {
        let api = RecordingApi::new();
        let mut out = Vec::new();
        let err = configure_fields(&api, "acme", 99, &specs(), Pacing::none(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("project #99"));
        assert!(api.calls().is_empty());
    }
}
