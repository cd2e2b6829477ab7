//! Linking child issues to their Epics.
//!
//! The matcher decides which Epic each child belongs to; this module turns
//! that plan into remote changes with one of three strategies.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::github::ProjectsApi;
use crate::matcher::{ChildIssue, EpicGroup, EpicIndex, LinkPlan};
use crate::model::issue_record::IssueRecord;
use crate::util::pacing::Pacing;

const SUB_ISSUES_HEADING: &str = "## Sub-issues";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LinkStrategy {
    /// Native sub-issue relationship via `addSubIssue`
    ParentIssue,
    /// Add children to the Epics board
    Board,
    /// Board, plus a task list in the Epic's description
    #[default]
    Checklist,
}

impl fmt::Display for LinkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkStrategy::ParentIssue => "parent-issue",
            LinkStrategy::Board => "board",
            LinkStrategy::Checklist => "checklist",
        })
    }
}

/// Where the Epics and their children live.
#[derive(Debug, Clone, Copy)]
pub struct LinkTarget<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub epics_project: u64,
    pub issues_project: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkSummary {
    pub linked: usize,
    pub failed: usize,
    pub unmatched: usize,
    pub without_link: usize,
    pub added_to_board: usize,
    pub epics_updated: usize,
    /// Epics whose description already had a sub-issues section.
    pub epics_skipped: usize,
    /// Children of skipped Epics; not written to any checklist.
    pub not_listed: usize,
}

pub fn has_sub_issues_section(body: &str) -> bool {
    body.to_lowercase()
        .contains(&SUB_ISSUES_HEADING.to_lowercase())
}

/// `body` with a task list of the given issue numbers appended.
pub fn append_checklist(body: &str, numbers: &[u64]) -> String {
    let items: Vec<String> = numbers.iter().map(|n| format!("- [ ] #{n}")).collect();
    format!("{body}\n\n{SUB_ISSUES_HEADING}\n\n{}", items.join("\n"))
}

enum BoardOutcome {
    Added,
    Present,
    Failed,
}

struct Linker<'a, A: ?Sized> {
    api: &'a A,
    target: LinkTarget<'a>,
    epics_project_id: String,
    on_epics_board: HashSet<String>,
    pacing: Pacing,
    summary: LinkSummary,
}

impl<'a, A: ProjectsApi + ?Sized> Linker<'a, A> {
    async fn apply<W: Write>(
        &mut self,
        strategy: LinkStrategy,
        group: &EpicGroup,
        out: &mut W,
    ) -> Result<()> {
        match strategy {
            LinkStrategy::ParentIssue => {
                for child in &group.children {
                    self.link_parent(group, child, out).await?;
                }
            }
            LinkStrategy::Board => {
                writeln!(out, "Epic: {}", group.epic.title)?;
                for child in &group.children {
                    match self.ensure_on_board(child, out).await? {
                        BoardOutcome::Added | BoardOutcome::Present => self.summary.linked += 1,
                        BoardOutcome::Failed => self.summary.failed += 1,
                    }
                }
            }
            LinkStrategy::Checklist => self.link_checklist(group, out).await?,
        }
        Ok(())
    }

    async fn link_parent<W: Write>(
        &mut self,
        group: &EpicGroup,
        child: &ChildIssue,
        out: &mut W,
    ) -> Result<()> {
        writeln!(out, "Linking: {}", child.title)?;
        writeln!(out, "  → Epic: {}", group.epic.title)?;
        let Some(child_id) = child.issue_id.as_deref() else {
            writeln!(out, "  ✗ Draft issues cannot have a parent")?;
            self.summary.failed += 1;
            return Ok(());
        };

        match self.api.add_sub_issue(&group.epic.issue_id, child_id).await {
            Ok(()) => {
                writeln!(out, "  ✓ Linked successfully")?;
                self.summary.linked += 1;
            }
            Err(e) => {
                writeln!(out, "  ✗ Failed to link: {e}")?;
                self.summary.failed += 1;
            }
        }
        self.pacing.pause().await;
        Ok(())
    }

    async fn ensure_on_board<W: Write>(
        &mut self,
        child: &ChildIssue,
        out: &mut W,
    ) -> Result<BoardOutcome> {
        let Some(issue_id) = child.issue_id.as_deref() else {
            writeln!(out, "  ✗ {} is a draft and cannot be added to another board", child.title)?;
            return Ok(BoardOutcome::Failed);
        };
        if self.on_epics_board.contains(issue_id) {
            writeln!(out, "  ℹ Already on Epics board: {}", child.title)?;
            return Ok(BoardOutcome::Present);
        }

        let outcome = match self.api.add_item(&self.epics_project_id, issue_id).await {
            Ok(_) => {
                writeln!(out, "  ✓ Added to Epics board: {}", child.title)?;
                self.on_epics_board.insert(issue_id.to_string());
                self.summary.added_to_board += 1;
                BoardOutcome::Added
            }
            Err(e) => {
                writeln!(out, "  ✗ Failed to add {} to Epics board: {e}", child.title)?;
                BoardOutcome::Failed
            }
        };
        self.pacing.pause().await;
        Ok(outcome)
    }

    async fn link_checklist<W: Write>(&mut self, group: &EpicGroup, out: &mut W) -> Result<()> {
        writeln!(out, "Epic: {}", group.epic.title)?;
        writeln!(out, "  {} sub-issues", group.children.len())?;

        let mut numbers = Vec::new();
        for child in &group.children {
            match self.ensure_on_board(child, out).await? {
                BoardOutcome::Failed => self.summary.failed += 1,
                _ => match child.number {
                    Some(number) => numbers.push(number),
                    None => self.summary.failed += 1,
                },
            }
        }
        if numbers.is_empty() {
            return Ok(());
        }

        let Some(epic_number) = group.epic.number else {
            writeln!(out, "  ⚠ Epic has no issue number, skipping description update")?;
            self.summary.failed += numbers.len();
            return Ok(());
        };
        let body = match self
            .api
            .issue_body(self.target.owner, self.target.repo, epic_number)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                writeln!(out, "  ⚠ Could not get Epic body ({e}), skipping update")?;
                self.summary.failed += numbers.len();
                return Ok(());
            }
        };
        if has_sub_issues_section(&body) {
            writeln!(out, "  ℹ Epic already has a sub-issues section, skipping update")?;
            self.summary.epics_skipped += 1;
            self.summary.not_listed += numbers.len();
            return Ok(());
        }

        let updated = append_checklist(&body, &numbers);
        match self
            .api
            .update_issue_body(self.target.owner, self.target.repo, epic_number, &updated)
            .await
        {
            Ok(()) => {
                writeln!(
                    out,
                    "  ✓ Updated Epic description with {} sub-issues",
                    numbers.len()
                )?;
                self.summary.epics_updated += 1;
                self.summary.linked += numbers.len();
            }
            Err(e) => {
                writeln!(out, "  ✗ Failed to update Epic description: {e}")?;
                self.summary.failed += numbers.len();
            }
        }
        self.pacing.pause().await;
        Ok(())
    }
}

/// Match every child on the issues board to an Epic on the Epics board and
/// link it with `strategy`. Setup failures are errors; per-item failures are
/// printed and counted.
pub async fn link_epics<A, W>(
    api: &A,
    target: LinkTarget<'_>,
    strategy: LinkStrategy,
    records: &HashMap<String, IssueRecord>,
    pacing: Pacing,
    out: &mut W,
) -> Result<LinkSummary>
where
    A: ProjectsApi + ?Sized,
    W: Write,
{
    writeln!(
        out,
        "Linking issues from project #{} to Epics in project #{} ({strategy})...",
        target.issues_project, target.epics_project
    )?;

    let epics_project = api
        .project(target.owner, target.epics_project)
        .await
        .with_context(|| format!("Failed to resolve Epics project #{}", target.epics_project))?;
    let issues_project = api
        .project(target.owner, target.issues_project)
        .await
        .with_context(|| format!("Failed to resolve issues project #{}", target.issues_project))?;
    writeln!(out, "Epics project: {} ({})", epics_project.title, epics_project.id)?;
    writeln!(out, "Issues project: {} ({})", issues_project.title, issues_project.id)?;

    let epic_items = api
        .items(&epics_project.id)
        .await
        .context("Failed to fetch Epics board items")?;
    let index = EpicIndex::from_items(&epic_items);
    writeln!(out, "Found {} Epics", index.len())?;
    if index.is_empty() {
        tracing::warn!(project = target.epics_project, "no Epics found");
    }

    let child_items = api
        .items(&issues_project.id)
        .await
        .context("Failed to fetch issues board items")?;
    let children: Vec<ChildIssue> = child_items
        .iter()
        .filter_map(|item| ChildIssue::from_item(item, records))
        .collect();
    writeln!(out, "Found {} child issues", children.len())?;
    writeln!(out)?;

    let plan = LinkPlan::build(&index, children);
    writeln!(
        out,
        "Matched {} child issues to {} Epics",
        plan.matched(),
        plan.groups.len()
    )?;
    for miss in &plan.unmatched {
        writeln!(
            out,
            "⚠ No matching Epic found for: {} (Epic Link '{}', normalized '{}')",
            miss.child.title, miss.link, miss.normalized
        )?;
    }

    let mut linker = Linker {
        api,
        target,
        epics_project_id: epics_project.id.clone(),
        on_epics_board: epic_items
            .iter()
            .filter_map(|item| item.issue_id().map(str::to_string))
            .collect(),
        pacing,
        summary: LinkSummary {
            unmatched: plan.unmatched.len(),
            without_link: plan.without_link,
            ..LinkSummary::default()
        },
    };
    for group in &plan.groups {
        linker.apply(strategy, group, out).await?;
    }
    let summary = linker.summary;

    writeln!(out)?;
    writeln!(out, "Done! Linked {} issues, {} failed.", summary.linked, summary.failed)?;
    writeln!(
        out,
        "  {} without a matching Epic, {} without an Epic Link",
        summary.unmatched, summary.without_link
    )?;
    if strategy != LinkStrategy::ParentIssue {
        writeln!(out, "  {} added to the Epics board", summary.added_to_board)?;
    }
    if strategy == LinkStrategy::Checklist {
        writeln!(
            out,
            "  {} Epic descriptions updated, {} already had sub-issues ({} children not listed)",
            summary.epics_updated, summary.epics_skipped, summary.not_listed
        )?;
    }
    Ok(summary)
}
