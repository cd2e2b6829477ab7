use chrono::NaiveDate;

pub const EPIC_LINK_FIELD: &str = "Epic Link";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Issue,
    DraftIssue,
}

/// What a board item wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemContent {
    /// Node id of the issue or draft issue.
    pub id: String,
    pub number: Option<u64>,
    pub title: String,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Text(String),
    SingleSelect(String),
    Number(f64),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub field: String,
    pub value: FieldData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    /// Board-level item id, distinct from the content's node id.
    pub id: String,
    pub content: Option<ItemContent>,
    pub field_values: Vec<FieldValue>,
}

impl ProjectItem {
    pub fn title(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.title.as_str())
    }

    /// Node id of the wrapped issue. Draft issues have none that can be linked.
    pub fn issue_id(&self) -> Option<&str> {
        self.content
            .as_ref()
            .filter(|c| c.kind == ContentKind::Issue)
            .map(|c| c.id.as_str())
    }

    pub fn text_value(&self, field: &str) -> Option<&str> {
        self.field_values.iter().find_map(|fv| match &fv.value {
            FieldData::Text(text) if fv.field == field => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn epic_link(&self) -> Option<&str> {
        self.text_value(EPIC_LINK_FIELD)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
