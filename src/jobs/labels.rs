use std::io::Write;

use anyhow::Result;

use super::SeedSummary;
use crate::github::GitHubClient;
use crate::model::label::LabelSpec;
use crate::util::pacing::Pacing;

/// Create every label, falling back to an update when it already exists.
pub async fn seed_labels<W: Write>(
    client: &GitHubClient,
    owner: &str,
    repo: &str,
    labels: &[LabelSpec],
    pacing: Pacing,
    out: &mut W,
) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    writeln!(out, "Adding labels to {owner}/{repo}...")?;
    writeln!(out)?;

    for label in labels {
        match client.create_label(owner, repo, label).await {
            Ok(()) => {
                writeln!(out, "✓ Created label: {}", label.name)?;
                summary.created += 1;
            }
            Err(e) if e.is_already_exists() => match client.update_label(owner, repo, label).await {
                Ok(()) => {
                    writeln!(out, "✓ Updated label: {}", label.name)?;
                    summary.updated += 1;
                }
                Err(e) => {
                    writeln!(out, "✗ Failed to update label: {} ({e})", label.name)?;
                    summary.failed += 1;
                }
            },
            Err(e) => {
                writeln!(out, "✗ Failed to create label: {} ({e})", label.name)?;
                summary.failed += 1;
            }
        }
        pacing.pause().await;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Done! Successfully processed {}/{} labels.",
        summary.succeeded(),
        labels.len()
    )?;
    Ok(summary)
}
