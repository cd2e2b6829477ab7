use std::io::Write;

use anyhow::Result;

use super::SeedSummary;
use crate::github::GitHubClient;
use crate::model::milestone::{ExistingMilestone, MilestoneSpec};
use crate::util::pacing::Pacing;

/// Create every milestone. On a conflict the existing milestone with the same
/// title is looked up and updated in place.
pub async fn seed_milestones<W: Write>(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    milestones: &[MilestoneSpec],
    pacing: Pacing,
    out: &mut W,
) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    // Listed lazily, on the first conflict.
    let mut existing: Option<Vec<ExistingMilestone>> = None;

    writeln!(out, "Adding milestones to {owner}/{repo}...")?;
    writeln!(out)?;

    for milestone in milestones {
        match client.create_milestone(owner, repo, milestone).await {
            Ok(()) => {
                writeln!(out, "✓ Created milestone: {}", milestone.title)?;
                summary.created += 1;
            }
            Err(e) if e.is_already_exists() => {
                if existing.is_none() {
                    match client.list_milestones(owner, repo).await {
                        Ok(list) => existing = Some(list),
                        Err(e) => {
                            tracing::warn!(status = ?e.status(), error = %e, "could not list milestones")
                        }
                    }
                }
                let number = existing
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .find(|m| m.title == milestone.title)
                    .map(|m| m.number);

                let Some(number) = number else {
                    writeln!(
                        out,
                        "✗ Failed to create milestone: {} (already exists or invalid)",
                        milestone.title
                    )?;
                    summary.failed += 1;
                    pacing.pause().await;
                    continue;
                };
                match client.update_milestone(owner, repo, number, milestone).await {
                    Ok(()) => {
                        writeln!(out, "✓ Updated milestone: {}", milestone.title)?;
                        summary.updated += 1;
                    }
                    Err(e) => {
                        writeln!(out, "✗ Failed to update milestone: {} ({e})", milestone.title)?;
                        summary.failed += 1;
                    }
                }
            }
            Err(e) => {
                writeln!(out, "✗ Failed to create milestone: {} ({e})", milestone.title)?;
                summary.failed += 1;
            }
        }
        pacing.pause().await;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Done! Successfully processed {}/{} milestones.",
        summary.succeeded(),
        milestones.len()
    )?;
    Ok(summary)
}
