//! Pairing child issues with their parent Epics.
//!
//! Nothing here is stored remotely: the association is inferred on every run
//! by normalizing Epic titles and the children's free-text "Epic Link".

use std::collections::HashMap;

use crate::model::issue_record::IssueRecord;
use crate::model::item::{ContentKind, ProjectItem};

const EPIC_PREFIX: &str = "epic:";

/// Strip a leading, case-insensitive `EPIC:` and the surrounding whitespace.
pub fn normalize_epic_title(title: &str) -> String {
    let rest = match title.get(..EPIC_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(EPIC_PREFIX) => &title[EPIC_PREFIX.len()..],
        _ => title,
    };
    rest.trim().to_string()
}

/// Whether a title carries the Epic marker anywhere.
pub fn is_epic_title(title: &str) -> bool {
    title.to_uppercase().contains("EPIC:")
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpicRef {
    pub item_id: String,
    pub issue_id: String,
    pub number: Option<u64>,
    pub title: String,
}

/// Normalized Epic title to Epic.
#[derive(Debug, Default)]
pub struct EpicIndex {
    epics: HashMap<String, EpicRef>,
}

impl EpicIndex {
    /// Build from the items of the Epics board. Only issues qualify. When any
    /// item carries the `EPIC:` marker, unmarked items (children added to the
    /// board earlier) are left out.
    pub fn from_items(items: &[ProjectItem]) -> Self {
        let issues: Vec<_> = items
            .iter()
            .filter_map(|item| {
                let content = item.content.as_ref()?;
                (content.kind == ContentKind::Issue).then_some((item, content))
            })
            .collect();
        let marked = issues.iter().any(|(_, c)| is_epic_title(&c.title));

        let mut epics = HashMap::new();
        for (item, content) in issues {
            if marked && !is_epic_title(&content.title) {
                continue;
            }
            let key = normalize_epic_title(&content.title);
            if key.is_empty() {
                continue;
            }
            let epic = EpicRef {
                item_id: item.id.clone(),
                issue_id: content.id.clone(),
                number: content.number,
                title: content.title.clone(),
            };
            if let Some(previous) = epics.insert(key.clone(), epic) {
                tracing::warn!(
                    key = %key,
                    replaced = %previous.title,
                    "duplicate Epic title, keeping the later one"
                );
            }
        }

        Self { epics }
    }

    pub fn len(&self) -> usize {
        self.epics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }

    /// Look up an Epic by an un-normalized link value.
    pub fn resolve(&self, link: &str) -> Option<&EpicRef> {
        self.epics.get(&normalize_epic_title(link))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildIssue {
    pub item_id: String,
    /// `None` for draft issues.
    pub issue_id: Option<String>,
    pub number: Option<u64>,
    pub title: String,
    pub epic_link: Option<String>,
}

impl ChildIssue {
    /// Board items that can be children: content present and not an Epic.
    /// The board's "Epic Link" field wins over the record from `issues.jsonl`.
    pub fn from_item(item: &ProjectItem, records: &HashMap<String, IssueRecord>) -> Option<Self> {
        let content = item.content.as_ref()?;
        if is_epic_title(&content.title) {
            return None;
        }
        let epic_link = item
            .epic_link()
            .map(str::to_string)
            .or_else(|| records.get(&content.title)?.epic_link.clone());

        Some(Self {
            item_id: item.id.clone(),
            issue_id: item.issue_id().map(str::to_string),
            number: content.number,
            title: content.title.clone(),
            epic_link,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EpicGroup {
    pub epic: EpicRef,
    pub children: Vec<ChildIssue>,
}

#[derive(Debug, Clone)]
pub struct Unmatched {
    pub child: ChildIssue,
    pub link: String,
    pub normalized: String,
}

/// Every child lands in exactly one bucket.
#[derive(Debug, Default)]
pub struct LinkPlan {
    pub groups: Vec<EpicGroup>,
    pub unmatched: Vec<Unmatched>,
    pub without_link: usize,
}

impl LinkPlan {
    pub fn build(index: &EpicIndex, children: Vec<ChildIssue>) -> Self {
        let mut plan = LinkPlan::default();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for child in children {
            let Some(link) = child.epic_link.clone() else {
                plan.without_link += 1;
                continue;
            };
            match index.resolve(&link) {
                Some(epic) => {
                    let pos = *positions.entry(epic.item_id.clone()).or_insert_with(|| {
                        plan.groups.push(EpicGroup {
                            epic: epic.clone(),
                            children: Vec::new(),
                        });
                        plan.groups.len() - 1
                    });
                    plan.groups[pos].children.push(child);
                }
                None => {
                    let normalized = normalize_epic_title(&link);
                    plan.unmatched.push(Unmatched {
                        child,
                        link,
                        normalized,
                    });
                }
            }
        }

        plan
    }

    pub fn matched(&self) -> usize {
        self.groups.iter().map(|g| g.children.len()).sum()
    }
}
